//! Structured logging setup with `tracing`.

use tracing_subscriber::EnvFilter;

/// Build the env filter: `RUST_LOG` wins over `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    if subscriber.try_init().is_ok() {
        tracing::debug!(level, "tracing subscriber installed");
    }
}

/// Initialize the global tracing subscriber with one JSON object per line.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .json();

    if subscriber.try_init().is_ok() {
        tracing::debug!(level, format = "json", "tracing subscriber installed");
    }
}
