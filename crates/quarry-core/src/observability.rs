//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless: later calls leave the first subscriber in place.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let result = if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    if result.is_ok() {
        tracing::debug!(level = %config.log_level, json = config.json_logs, "tracing initialized");
    }
}
