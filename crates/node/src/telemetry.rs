//! Structured-logging initialization for the embedding runtime.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber, honoring `RUST_LOG` and
/// defaulting to `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
