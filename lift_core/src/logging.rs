//! Tracing setup shared by the liftlog binaries.

use tracing_subscriber::EnvFilter;

/// Initialize logging at the default INFO level
pub fn init() {
    init_with_level("info")
}

/// Initialize logging with a given default level (debug, info, warn, error)
///
/// The level only applies when `RUST_LOG` is unset; a set environment
/// filter always wins. Output is compact, colored where the terminal
/// supports it.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
