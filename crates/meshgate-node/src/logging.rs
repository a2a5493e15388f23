//! Tracing subscriber configuration for the gateway.
//!
//! Log levels follow these conventions:
//! - ERROR: unrecoverable failures (adapter cannot start, storage unusable)
//! - WARN: recoverable anomalies (mapping conflicts, circuit opening, exhausted deliveries)
//! - INFO: lifecycle (startup, shutdown, circuit closing, mapping confirmation)
//! - DEBUG: state transitions, announces, retries
//! - TRACE: frame-level detail

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise the configured level.
fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize human-readable output, falling back to `default_level`.
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize JSON output. Selected by `RUST_LOG_FORMAT=json`.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the subscriber for tests. Safe to call more than once.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_falls_back() {
        // Must not panic on garbage input.
        let _ = filter("not a [valid directive");
        let _ = filter("meshgate_transport=trace");
    }
}
