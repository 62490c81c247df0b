//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber writing formatted events to stderr.
///
/// `RUST_LOG` takes precedence over `filter`. Returns `false` if a subscriber
/// was already installed (the existing one stays in place).
pub fn init_logging(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
