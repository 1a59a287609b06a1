use serde::{Deserialize, Serialize};

use super::defaults;

/// Encoder, encode cache and batch pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Encoder provider: "hashing" or "http".
    pub provider: String,
    /// Model name. Part of the fingerprint.
    pub model: String,
    /// Model version. Part of the fingerprint; bump it to invalidate caches.
    pub model_version: String,
    /// Output dimensions.
    pub dimensions: usize,
    /// Base URL of an OpenAI-compatible embeddings API (http provider).
    pub endpoint: Option<String>,
    /// Environment variable holding the API key (http provider).
    pub api_key_env: String,
    /// Records per encode batch.
    pub batch_size: usize,
    /// Batches processed concurrently.
    pub workers: usize,
    /// Retries per batch after the first failed attempt.
    pub max_retries: u32,
    /// Initial retry backoff; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Upper bound on a single encoder call.
    pub call_timeout_ms: Option<u64>,
    /// Records between progress log lines.
    pub log_interval: usize,
    /// L1 in-memory cache max entries.
    pub l1_cache_size: u64,
    /// Enable the persistent L2 SQLite cache.
    pub l2_cache_enabled: bool,
    /// Path of the L2 cache database.
    pub cache_path: String,
    /// Optional L2 capacity; least-recently-used rows are evicted beyond it.
    pub cache_max_entries: Option<u64>,
    /// Query embedding cache size.
    pub query_cache_size: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: defaults::DEFAULT_EMBEDDING_PROVIDER.to_string(),
            model: defaults::DEFAULT_EMBEDDING_MODEL.to_string(),
            model_version: defaults::DEFAULT_EMBEDDING_MODEL_VERSION.to_string(),
            dimensions: defaults::DEFAULT_EMBEDDING_DIMENSIONS,
            endpoint: None,
            api_key_env: defaults::DEFAULT_EMBEDDING_API_KEY_ENV.to_string(),
            batch_size: defaults::DEFAULT_EMBEDDING_BATCH_SIZE,
            workers: defaults::DEFAULT_EMBEDDING_WORKERS,
            max_retries: defaults::DEFAULT_MAX_RETRIES,
            retry_backoff_ms: defaults::DEFAULT_RETRY_BACKOFF_MS,
            call_timeout_ms: None,
            log_interval: defaults::DEFAULT_LOG_INTERVAL,
            l1_cache_size: defaults::DEFAULT_L1_CACHE_SIZE,
            l2_cache_enabled: defaults::DEFAULT_L2_CACHE_ENABLED,
            cache_path: defaults::DEFAULT_CACHE_PATH.to_string(),
            cache_max_entries: None,
            query_cache_size: defaults::DEFAULT_QUERY_CACHE_SIZE,
        }
    }
}
