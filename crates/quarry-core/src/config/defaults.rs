// Single source of truth for all default values.

// --- Storage ---
pub const DEFAULT_DATA_DIR: &str = "quarry-store";
pub const DEFAULT_SYNC_WRITES: bool = true;
pub const DEFAULT_READ_POOL_SIZE: usize = 4;
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const DEFAULT_SCAN_PAGE_SIZE: usize = 256;

// --- Embeddings ---
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "hashing";
pub const DEFAULT_EMBEDDING_MODEL: &str = "hashing-tf";
pub const DEFAULT_EMBEDDING_MODEL_VERSION: &str = "1";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;
pub const DEFAULT_EMBEDDING_API_KEY_ENV: &str = "QUARRY_EMBEDDING_API_KEY";
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;
pub const DEFAULT_EMBEDDING_WORKERS: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
pub const DEFAULT_LOG_INTERVAL: usize = 10_000;
pub const DEFAULT_L1_CACHE_SIZE: u64 = 10_000;
pub const DEFAULT_L2_CACHE_ENABLED: bool = true;
pub const DEFAULT_CACHE_PATH: &str = "embeddings.db";
pub const DEFAULT_QUERY_CACHE_SIZE: u64 = 1_000;

// --- Index ---
pub const DEFAULT_INDEX_PATH: &str = "index";
pub const DEFAULT_INDEX_FIELD: &str = "text";
pub const DEFAULT_VERIFY_CHECKSUMS: bool = true;
pub const DEFAULT_IVF_N_LISTS: usize = 256;
pub const DEFAULT_IVF_N_PROBE: usize = 16;
pub const DEFAULT_IVF_TRAIN_SIZE: usize = 65_536;
pub const DEFAULT_KMEANS_ITERATIONS: usize = 10;
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 512;
pub const DEFAULT_PARALLEL_SCAN_THRESHOLD: usize = 4_096;
pub const DEFAULT_BM25_K1: f32 = 1.2;
pub const DEFAULT_BM25_B: f32 = 0.75;
pub const DEFAULT_MIN_TOKEN_LEN: usize = 1;
pub const DEFAULT_DENSE_WEIGHT: f64 = 0.5;
pub const DEFAULT_RRF_K: u32 = 60;
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

// --- Retrieval ---
pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_POOL_SIZE: usize = 50;
pub const DEFAULT_FILTER_OVERSAMPLE: usize = 4;
pub const DEFAULT_RERANK_ENABLED: bool = false;
pub const DEFAULT_RERANKER_MODEL: &str = "jina-reranker-v2-base-multilingual";
pub const DEFAULT_RERANKER_API_KEY_ENV: &str = "QUARRY_RERANKER_API_KEY";
pub const DEFAULT_RERANKER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RESULT_CACHE_SIZE: u64 = 0;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = false;
