//! `kernelctl`: the administrative CLI plus the HTTP server entry point,
//! mirroring `documentstore/kernelctl.py`'s `argparse` subcommand
//! structure one-for-one (`create-indexes`, `create-collections`) with
//! one addition: `serve`, which actually runs the HTTP API `kernelctl.py`
//! has no counterpart for since the original ships it as a separate
//! Pyramid WSGI app (spec §6.2).

use std::{
    sync::Arc,
    time::Duration,
};

use clap::{
    Parser,
    Subcommand,
};

use application::Handlers;
use object_store::Client;
use storage::MongoHandle;

#[derive(Parser)]
#[command(name = "kernelctl", author, version, about = "SciELO Kernel command line utility.")]
struct Cli {
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`). Defaults to
    /// `info` when unset, matching `kernelctl.py`'s bare `logging.basicConfig`
    /// falling back to `WARNING` only when given garbage.
    #[arg(long, default_value = "info")]
    loglevel: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create all database indexes. May cause outages on replica sets mid
    /// index build; see the MongoDB docs on index creation operations.
    CreateIndexes {
        /// DSN for the MongoDB node where indexes will be created.
        dsn: String,
        /// Database name.
        dbname: String,
    },
    /// Explicitly create all database collections, required when using
    /// transactional support on MongoDB < 4.4.
    CreateCollections {
        /// DSN for the MongoDB node where collections will be created.
        dsn: String,
        /// Database name.
        dbname: String,
    },
    /// Run the HTTP API and, if enabled, the Prometheus exporter.
    Serve {
        /// DSN for the MongoDB node backing the store.
        dsn: String,
        /// Database name.
        dbname: String,
        /// Address the HTTP API binds to.
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cmd_util::init_tracing(&cli.loglevel);

    let result = tokio::select! {
        result = run(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("got a Ctrl+C, terminating the program");
            std::process::exit(130)
        },
    };

    if let Err(err) = result {
        tracing::error!(%err, "an unexpected error has occurred");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::CreateIndexes { dsn, dbname } => {
            let mongo = MongoHandle::new(dsn, dbname);
            storage::admin::create_indexes(&mongo.database().await?).await?;
        },
        Command::CreateCollections { dsn, dbname } => {
            let mongo = MongoHandle::new(dsn, dbname);
            storage::admin::create_collections(&mongo.database().await?).await?;
        },
        Command::Serve { dsn, dbname, bind } => serve(dsn, dbname, bind).await?,
    }
    Ok(())
}

/// Wires the lazy Mongo handle, object-store client and fetch timeout into
/// a [`Handlers`] factory, starts the Prometheus exporter when enabled
/// (spec §6.3), and serves the HTTP API until the process is signalled.
async fn serve(dsn: String, dbname: String, bind: String) -> anyhow::Result<()> {
    let mongo = MongoHandle::new(dsn, dbname);
    let fetcher = Arc::new(Client::new());
    let timeout = Duration::from_secs(cmd_util::env_config("KERNEL_LIB_FETCH_TIMEOUT_SECS", 30u64));
    let handlers = Arc::new(Handlers::new(mongo, fetcher, timeout));

    if cmd_util::env_config("kernel.app.prometheus.enabled", false) {
        let port = cmd_util::env_config("kernel.app.prometheus.port", 9090u16);
        metrics::serve(port);
    }

    let router = kernel_http::router(handlers);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "starting kernel HTTP API");
    axum::serve(listener, router).await?;
    Ok(())
}
