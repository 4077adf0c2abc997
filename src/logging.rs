use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info,multiparam_lib=debug";

/// Install the global tracing subscriber.
///
/// - Compact, human-readable output on stdout
/// - Default level: INFO, DEBUG for this crate; override via `RUST_LOG`
///
/// Safe to call more than once: later calls are no-ops.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .compact();

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Tracing initialized");
    }
}
