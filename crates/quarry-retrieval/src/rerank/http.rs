//! Blocking client for Jina-style `/rerank` endpoints.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quarry_core::config::RerankerConfig;
use quarry_core::errors::{EmbeddingError, QuarryError, QuarryResult};
use quarry_core::traits::IReranker;

pub struct HttpReranker {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpReranker {
    /// The API key is read from the variable named by `api_key_env`; when
    /// unset, no auth header is sent.
    pub fn new(config: &RerankerConfig) -> QuarryResult<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| QuarryError::ConfigError {
            reason: "retrieval.reranker.endpoint is required".to_string(),
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

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| QuarryError::ConfigError {
                reason: format!("failed to build reranker HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f64,
}

/// Place each score at its document index. Every index must appear once.
fn scores_by_index(results: Vec<RerankResult>, documents: usize) -> QuarryResult<Vec<f64>> {
    let mut scores = vec![None; documents];
    for result in &results {
        match scores.get_mut(result.index) {
            Some(slot) if slot.is_none() => *slot = Some(result.relevance_score),
            _ => {
                return Err(EmbeddingError::InferenceFailed {
                    reason: format!("rerank result index {} is out of range or repeated", result.index),
                }
                .into())
            }
        }
    }
    scores
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| {
            EmbeddingError::PartialBatch {
                requested: documents,
                returned: results.len(),
            }
            .into()
        })
}

impl IReranker for HttpReranker {
    fn score(&self, query: &str, documents: &[String]) -> QuarryResult<Vec<f64>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: documents.len(),
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
                reason: format!("rerank request failed ({status}): {body}"),
            }
            .into());
        }

        let parsed: RerankResponse = response.json().map_err(|e| EmbeddingError::InferenceFailed {
            reason: format!("unparsable rerank response: {e}"),
        })?;
        debug!(documents = documents.len(), endpoint = %self.endpoint, "rerank scores received");
        scores_by_index(parsed.results, documents.len())
    }

    fn name(&self) -> &str {
        "http"
    }
}
