use serde::{Deserialize, Serialize};

use super::defaults;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive, e.g. "info" or "quarry_index=debug".
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            json_logs: defaults::DEFAULT_JSON_LOGS,
        }
    }
}
