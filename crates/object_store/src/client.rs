//! HTTP client for fetching document/asset XML from the object store, with
//! retry/backoff and the two metrics named in spec §4.4.

use std::time::{
    Duration,
    Instant,
};

use backoff::backoff::Backoff;
use errors::KernelError;
use metrics::{
    register_counter,
    register_histogram,
};

register_histogram!(pub KERNEL_OBJECTSTORE_RESPONSE_TIME_SECONDS, "Elapsed time between the request for an XML and the response");
register_counter!(pub KERNEL_OBJECTSTORE_REQUEST_FAILURES_TOTAL, "Total number of exceptions raised when requesting for an XML from the object-store");

/// Retries a fixed number of times with `backoff_factor.powi(attempt)`
/// second waits between tries, mirroring `retry_gracefully` in the source
/// this was ported from.
struct CountingBackoff {
    attempt: u32,
    max_retries: u32,
    backoff_factor: f64,
}

impl Backoff for CountingBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        Some(Duration::from_secs_f64(self.backoff_factor.powi(self.attempt as i32)))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Fetches raw bytes over HTTP, retrying transient failures and classifying
/// terminal ones, per spec §4.4.
pub struct Client {
    http: reqwest::Client,
    max_retries: u32,
    backoff_factor: f64,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            max_retries: cmd_util::env_config("KERNEL_LIB_MAX_RETRIES", 4u32),
            backoff_factor: cmd_util::env_config("KERNEL_LIB_BACKOFF_FACTOR", 1.2f64),
        }
    }

    /// Fetches `url`'s body, retrying connection/timeout failures and 5xx
    /// responses up to `max_retries` times. 4xx responses and malformed
    /// URLs are terminal and returned immediately.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, KernelError> {
        let backoff = CountingBackoff { attempt: 0, max_retries: self.max_retries, backoff_factor: self.backoff_factor };

        backoff::future::retry(backoff, || async {
            let start = Instant::now();
            let result = self.fetch_once(url, timeout).await;
            KERNEL_OBJECTSTORE_RESPONSE_TIME_SECONDS.observe(start.elapsed().as_secs_f64());

            result.map_err(|err| {
                KERNEL_OBJECTSTORE_REQUEST_FAILURES_TOTAL.inc();
                match &err {
                    KernelError::Retryable(msg) => {
                        tracing::info!(url, %msg, "retryable object-store failure");
                        backoff::Error::transient(err)
                    },
                    _ => backoff::Error::permanent(err),
                }
            })
        })
        .await
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, KernelError> {
        let request = self.http.get(url).timeout(timeout).build().map_err(|err| {
            KernelError::Terminal(format!("invalid URL \"{url}\": {err}"))
        })?;

        let response = self.http.execute(request).await.map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            return Err(KernelError::Terminal(format!("object-store returned {status} for {url}")));
        }
        if status.is_server_error() {
            return Err(KernelError::Retryable(format!("object-store returned {status} for {url}")));
        }

        response.bytes().await.map(|b| b.to_vec()).map_err(classify_transport_error)
    }
}

fn classify_transport_error(err: reqwest::Error) -> KernelError {
    if err.is_timeout() || err.is_connect() {
        KernelError::Retryable(err.to_string())
    } else if err.is_builder() || err.is_request() {
        KernelError::Terminal(err.to_string())
    } else {
        KernelError::Retryable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{
            method,
            path,
        },
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn fetches_successful_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<article/>".to_vec()))
            .mount(&server)
            .await;

        let client = Client { http: reqwest::Client::new(), max_retries: 2, backoff_factor: 1.01 };
        let body = client.fetch(&format!("{}/doc.xml", server.uri()), Duration::from_secs(2)).await.unwrap();
        assert_eq!(body, b"<article/>");
    }

    #[tokio::test]
    async fn classifies_4xx_as_terminal_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.xml"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client { http: reqwest::Client::new(), max_retries: 3, backoff_factor: 1.01 };
        let err = client.fetch(&format!("{}/missing.xml", server.uri()), Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, KernelError::Terminal(_)));
    }

    #[tokio::test]
    async fn retries_5xx_up_to_max_retries_then_surfaces_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.xml"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = Client { http: reqwest::Client::new(), max_retries: 2, backoff_factor: 1.01 };
        let err = client.fetch(&format!("{}/flaky.xml", server.uri()), Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, KernelError::Retryable(_)));
    }
}
