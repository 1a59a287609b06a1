use std::fmt;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Index backend variant. Chosen once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendVariant {
    Dense,
    Sparse,
    Hybrid,
}

impl BackendVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendVariant::Dense => "dense",
            BackendVariant::Sparse => "sparse",
            BackendVariant::Hybrid => "hybrid",
        }
    }

    /// Whether queries need a vector from the encoder.
    pub fn needs_encoder(&self) -> bool {
        matches!(self, BackendVariant::Dense | BackendVariant::Hybrid)
    }

    /// Whether queries need raw text for the tokenizer.
    pub fn needs_tokenizer(&self) -> bool {
        matches!(self, BackendVariant::Sparse | BackendVariant::Hybrid)
    }
}

impl fmt::Display for BackendVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Cosine,
    InnerProduct,
    L2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenseStructure {
    /// Exact brute-force scan.
    Flat,
    /// Inverted file over k-means centroids. Approximate.
    Ivf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionRule {
    /// Min-max normalized weighted score sum.
    Weighted,
    /// Reciprocal rank fusion.
    Rrf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenseIndexConfig {
    pub metric: DistanceMetric,
    pub structure: DenseStructure,
    pub n_lists: usize,
    pub n_probe: usize,
    /// Vectors buffered to train the IVF quantizer.
    pub train_size: usize,
    pub kmeans_iterations: usize,
    /// Rows written to the vector file per flush.
    pub insert_batch_size: usize,
    /// Row count above which flat scans run in parallel.
    pub parallel_scan_threshold: usize,
}

impl Default for DenseIndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            structure: DenseStructure::Flat,
            n_lists: defaults::DEFAULT_IVF_N_LISTS,
            n_probe: defaults::DEFAULT_IVF_N_PROBE,
            train_size: defaults::DEFAULT_IVF_TRAIN_SIZE,
            kmeans_iterations: defaults::DEFAULT_KMEANS_ITERATIONS,
            insert_batch_size: defaults::DEFAULT_INSERT_BATCH_SIZE,
            parallel_scan_threshold: defaults::DEFAULT_PARALLEL_SCAN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseIndexConfig {
    pub k1: f32,
    pub b: f32,
    /// Tokens shorter than this are dropped.
    pub min_token_len: usize,
    pub stopwords: Vec<String>,
}

impl Default for SparseIndexConfig {
    fn default() -> Self {
        Self {
            k1: defaults::DEFAULT_BM25_K1,
            b: defaults::DEFAULT_BM25_B,
            min_token_len: defaults::DEFAULT_MIN_TOKEN_LEN,
            stopwords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridIndexConfig {
    pub fusion: FusionRule,
    /// Weight of the dense score under `Weighted` fusion; sparse gets `1 - w`.
    pub dense_weight: f64,
    pub rrf_k: u32,
    /// Each sub-search fetches `k * candidate_multiplier` candidates.
    pub candidate_multiplier: usize,
}

impl Default for HybridIndexConfig {
    fn default() -> Self {
        Self {
            fusion: FusionRule::Weighted,
            dense_weight: defaults::DEFAULT_DENSE_WEIGHT,
            rrf_k: defaults::DEFAULT_RRF_K,
            candidate_multiplier: defaults::DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }
}

/// Index backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub variant: BackendVariant,
    /// Directory the index is persisted to.
    pub path: String,
    /// Record fields selected for indexing.
    pub fields: Vec<String>,
    /// Verify file checksums from the manifest on load.
    pub verify_checksums: bool,
    pub dense: DenseIndexConfig,
    pub sparse: SparseIndexConfig,
    pub hybrid: HybridIndexConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            variant: BackendVariant::Dense,
            path: defaults::DEFAULT_INDEX_PATH.to_string(),
            fields: vec![defaults::DEFAULT_INDEX_FIELD.to_string()],
            verify_checksums: defaults::DEFAULT_VERIFY_CHECKSUMS,
            dense: DenseIndexConfig::default(),
            sparse: SparseIndexConfig::default(),
            hybrid: HybridIndexConfig::default(),
        }
    }
}
