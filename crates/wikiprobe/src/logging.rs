//! Tracing subscriber setup for test runs.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, `fallback` otherwise
#[must_use]
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install a global subscriber
///
/// Returns `false` if one was already installed, so repeated calls from
/// several test binaries are harmless.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.filter))
        .with_target(true);
    match config.format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Install a test-friendly subscriber that writes through the test harness
pub fn init_test_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("wikiprobe=debug"))
        .with_test_writer()
        .try_init()
        .is_ok()
}
