//! Small process-entry helpers shared by the CLI and HTTP server binaries.
//!
//! `env_config` reads tunables straight from the environment with a typed
//! default (retry counts, backoff factors, ports), and `init_tracing` sets
//! up a compact env-filtered subscriber for both binaries to share.

pub mod env;

pub use env::{
    env_config,
    init_tracing,
};
