use std::{
    env,
    fmt::Debug,
    str::FromStr,
};

use tracing_subscriber::EnvFilter;

/// Reads `name` from the environment, falling back to `default` when it is
/// absent or fails to parse. Logs at info/warn so operators can see what
/// took effect.
pub fn env_config<T>(name: &str, default: T) -> T
where
    T: Debug + FromStr,
{
    match env::var(name) {
        Err(env::VarError::NotPresent) => default,
        Err(env::VarError::NotUnicode(_)) => {
            tracing::warn!(name, ?default, "non-unicode value, falling back to default");
            default
        },
        Ok(raw) => match raw.parse() {
            Ok(value) => {
                tracing::info!(name, raw, "overriding from environment");
                value
            },
            Err(_) => {
                tracing::warn!(name, raw, ?default, "invalid value, falling back to default");
                default
            },
        },
    }
}

/// Initializes a `tracing_subscriber` compact formatter honoring
/// `RUST_LOG`/`--loglevel`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init();
}
