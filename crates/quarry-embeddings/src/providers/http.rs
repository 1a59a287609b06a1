//! Blocking client for OpenAI-compatible `/embeddings` endpoints.
//!
//! One request per call; retries belong to the batch encoder.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};
use quarry_core::models::Fingerprint;
use quarry_core::traits::IEncoder;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpEncoder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    fingerprint: Fingerprint,
}

impl HttpEncoder {
    /// The API key is read from the environment variable named by
    /// `embedding.api_key_env`; when unset, no auth header is sent.
    pub fn new(config: &EmbeddingConfig) -> QuarryResult<Self> {
        let base = config.endpoint.as_deref().ok_or_else(|| QuarryError::ConfigError {
            reason: "embedding.endpoint is required for the http provider".to_string(),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(key) = std::env::var(&config.api_key_env) {
            if !key.trim().is_empty() {
                let auth = HeaderValue::from_str(&format!("Bearer {}", key.trim())).map_err(|_| {
                    QuarryError::ConfigError {
                        reason: format!("{} holds an invalid API key", config.api_key_env),
                    }
                })?;
                headers.insert(AUTHORIZATION, auth);
            }
        }

        let timeout = config
            .call_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| QuarryError::ConfigError {
                reason: format!("failed to build embeddings HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
            fingerprint: Fingerprint::new(&config.model, &config.model_version, config.dimensions),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl IEncoder for HttpEncoder {
    fn encode_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| EmbeddingError::ProviderUnavailable {
                provider: format!("{}: {e}", self.endpoint),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("embeddings request failed ({status}): {body}"),
            }
            .into());
        }

        let mut parsed: EmbeddingResponse =
            response.json().map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("unparsable embeddings response: {e}"),
            })?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::PartialBatch {
                requested: texts.len(),
                returned: parsed.data.len(),
            }
            .into());
        }
        if let Some(bad) = parsed.data.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.embedding.len(),
            }
            .into());
        }

        debug!(inputs = texts.len(), endpoint = %self.endpoint, "remote embeddings received");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_required() {
        let config = EmbeddingConfig {
            provider: "http".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            HttpEncoder::new(&config),
            Err(QuarryError::ConfigError { .. })
        ));
    }

    #[test]
    fn endpoint_path_is_normalized() {
        let config = EmbeddingConfig {
            provider: "http".to_string(),
            endpoint: Some("http://localhost:8080/v1/".to_string()),
            ..EmbeddingConfig::default()
        };
        let encoder = HttpEncoder::new(&config).unwrap();
        assert_eq!(encoder.endpoint(), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn empty_batch_skips_the_network() {
        let config = EmbeddingConfig {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..EmbeddingConfig::default()
        };
        let encoder = HttpEncoder::new(&config).unwrap();
        assert!(encoder.encode_batch(&[]).unwrap().is_empty());
    }
}
