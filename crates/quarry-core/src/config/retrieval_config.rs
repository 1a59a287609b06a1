use serde::{Deserialize, Serialize};

use super::defaults;

/// Query-time configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default number of results.
    pub top_k: usize,
    /// Candidates fetched from the index before filtering and reranking.
    /// The effective pool is never smaller than the requested top_k.
    pub pool_size: usize,
    /// Pool multiplier applied when field filters are present.
    pub filter_oversample: usize,
    /// Run the reranker over the candidate pool.
    pub rerank_enabled: bool,
    pub reranker: RerankerConfig,
    /// Query result cache entries. 0 disables the cache.
    pub result_cache_size: u64,
    /// Fields copied into results. Empty means all fields.
    pub display_fields: Vec<String>,
    /// Named query rewriting steps, applied in order: `lowercase`,
    /// `strip_punctuation`, `collapse_whitespace`.
    pub query_preprocess: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::DEFAULT_TOP_K,
            pool_size: defaults::DEFAULT_POOL_SIZE,
            filter_oversample: defaults::DEFAULT_FILTER_OVERSAMPLE,
            rerank_enabled: defaults::DEFAULT_RERANK_ENABLED,
            reranker: RerankerConfig::default(),
            result_cache_size: defaults::DEFAULT_RESULT_CACHE_SIZE,
            display_fields: Vec::new(),
            query_preprocess: Vec::new(),
        }
    }
}

/// HTTP reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    /// Full URL of a `/rerank` endpoint.
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: defaults::DEFAULT_RERANKER_MODEL.to_string(),
            api_key_env: defaults::DEFAULT_RERANKER_API_KEY_ENV.to_string(),
            timeout_ms: defaults::DEFAULT_RERANKER_TIMEOUT_MS,
        }
    }
}
