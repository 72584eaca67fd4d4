//! Tracing setup — structured logging with span definitions.

pub mod spans;

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with structured JSON output.
///
/// Respects the `EMBED_LOG` environment variable for filtering. Defaults
/// to `info` if not set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("EMBED_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();
}

/// Initialize tracing with an explicit filter string (tests, embedding
/// into another process that already owns a subscriber otherwise).
pub fn init_tracing_with_filter(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .json()
        .init();
}
