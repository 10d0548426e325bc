//! Prometheus wiring shared by every crate that exposes a metric.
//!
//! A single registry, a handful of counters/histograms registered against
//! it, and a tiny HTTP server that exposes them for scraping. The macros
//! below are a small `macro_rules!` family covering counters, vecs,
//! histograms and gauges without per-metric boilerplate.

use std::{
    net::SocketAddr,
    sync::LazyLock,
};

use axum::{
    routing::get,
    Router,
};
use prometheus::{
    Encoder,
    Registry,
    TextEncoder,
};

pub use prometheus;

/// Registry every metric in this workspace is registered against. Kept
/// separate from `prometheus::default_registry()` so tests can construct
/// fresh collectors without touching global state.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Registers an `IntCounter` under `$NAME` (lower snake case) and stores it
/// in a `LazyLock` static.
#[macro_export]
macro_rules! register_counter {
    ($VIS:vis $NAME:ident, $HELP:literal) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounter> =
            std::sync::LazyLock::new(|| {
                let counter = $crate::prometheus::IntCounter::new(stringify!($NAME).to_lowercase(), $HELP)
                    .expect("metric definition is valid");
                $crate::REGISTRY
                    .register(Box::new(counter.clone()))
                    .expect("metric name is unique");
                counter
            });
    };
}

/// Registers a labeled `IntCounterVec`.
#[macro_export]
macro_rules! register_counter_vec {
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntCounterVec> =
            std::sync::LazyLock::new(|| {
                let opts = $crate::prometheus::Opts::new(stringify!($NAME).to_lowercase(), $HELP);
                let counter = $crate::prometheus::IntCounterVec::new(opts, $LABELS)
                    .expect("metric definition is valid");
                $crate::REGISTRY
                    .register(Box::new(counter.clone()))
                    .expect("metric name is unique");
                counter
            });
    };
}

/// Registers a `Histogram` with default buckets.
#[macro_export]
macro_rules! register_histogram {
    ($VIS:vis $NAME:ident, $HELP:literal) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::Histogram> =
            std::sync::LazyLock::new(|| {
                let opts = $crate::prometheus::HistogramOpts::new(stringify!($NAME).to_lowercase(), $HELP);
                let histogram =
                    $crate::prometheus::Histogram::with_opts(opts).expect("metric definition is valid");
                $crate::REGISTRY
                    .register(Box::new(histogram.clone()))
                    .expect("metric name is unique");
                histogram
            });
    };
}

/// Registers a labeled `HistogramVec`.
#[macro_export]
macro_rules! register_histogram_vec {
    ($VIS:vis $NAME:ident, $HELP:literal, $LABELS:expr) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::HistogramVec> =
            std::sync::LazyLock::new(|| {
                let opts = $crate::prometheus::HistogramOpts::new(stringify!($NAME).to_lowercase(), $HELP);
                let histogram = $crate::prometheus::HistogramVec::new(opts, $LABELS)
                    .expect("metric definition is valid");
                $crate::REGISTRY
                    .register(Box::new(histogram.clone()))
                    .expect("metric name is unique");
                histogram
            });
    };
}

/// Registers an `IntGauge`.
#[macro_export]
macro_rules! register_gauge {
    ($VIS:vis $NAME:ident, $HELP:literal) => {
        $VIS static $NAME: std::sync::LazyLock<$crate::prometheus::IntGauge> =
            std::sync::LazyLock::new(|| {
                let gauge = $crate::prometheus::IntGauge::new(stringify!($NAME).to_lowercase(), $HELP)
                    .expect("metric definition is valid");
                $crate::REGISTRY
                    .register(Box::new(gauge.clone()))
                    .expect("metric name is unique");
                gauge
            });
    };
}

fn encode() -> String {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buf)
        .expect("prometheus text encoding never fails");
    String::from_utf8(buf).expect("prometheus output is valid utf8")
}

async fn metrics_handler() -> String {
    encode()
}

/// Starts the `/metrics` exporter on `port`. Runs on its own task so it can
/// be started alongside the main HTTP server without blocking it.
pub fn serve(port: u16) -> tokio::task::JoinHandle<()> {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tokio::spawn(async move {
        tracing::info!(%addr, "starting prometheus exporter");
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app).await {
                    tracing::error!(%err, "prometheus exporter stopped");
                }
            },
            Err(err) => tracing::error!(%err, "could not bind prometheus exporter"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    register_counter!(TEST_COUNTER_TOTAL, "a test counter");

    #[test]
    fn registered_counters_are_reflected_in_gather() {
        TEST_COUNTER_TOTAL.inc();
        let families = REGISTRY.gather();
        assert!(families
            .iter()
            .any(|f| f.name() == "test_counter_total" && f.get_metric()[0].get_counter().get_value() >= 1.0));
    }
}
