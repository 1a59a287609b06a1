//! Built-in encoders and provider selection.

mod hashing;
mod http;

use std::sync::Arc;

use tracing::info;

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::traits::IEncoder;

pub use hashing::HashingEncoder;
pub use http::HttpEncoder;

/// Build the encoder named by `embedding.provider`.
pub fn create_encoder(config: &EmbeddingConfig) -> QuarryResult<Arc<dyn IEncoder>> {
    let encoder: Arc<dyn IEncoder> = match config.provider.as_str() {
        "hashing" => Arc::new(HashingEncoder::from_config(config)),
        "http" => Arc::new(HttpEncoder::new(config)?),
        other => {
            return Err(QuarryError::ConfigError {
                reason: format!("unknown embedding provider: {other}"),
            })
        }
    };
    info!(
        provider = encoder.name(),
        fingerprint = %encoder.fingerprint(),
        "encoder initialized"
    );
    Ok(encoder)
}
