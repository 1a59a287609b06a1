pub mod defaults;
mod embedding_config;
mod index_config;
mod observability_config;
mod retrieval_config;
mod storage_config;

use serde::{Deserialize, Serialize};

pub use embedding_config::EmbeddingConfig;
pub use index_config::{
    BackendVariant, DenseIndexConfig, DenseStructure, DistanceMetric, FusionRule,
    HybridIndexConfig, IndexConfig, SparseIndexConfig,
};
pub use observability_config::ObservabilityConfig;
pub use retrieval_config::{RerankerConfig, RetrievalConfig};
pub use storage_config::StorageConfig;

use crate::errors::{QuarryError, QuarryResult};

/// Top-level configuration. Constructed once and passed by reference into
/// each component's constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub observability: ObservabilityConfig,
}

impl QuarryConfig {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml(s: &str) -> QuarryResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| QuarryError::ConfigError {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can operate with.
    pub fn validate(&self) -> QuarryResult<()> {
        let fail = |reason: &str| {
            Err(QuarryError::ConfigError {
                reason: reason.to_string(),
            })
        };

        if self.embedding.batch_size == 0 {
            return fail("embedding.batch_size must be positive");
        }
        if self.embedding.workers == 0 {
            return fail("embedding.workers must be positive");
        }
        if self.embedding.dimensions == 0 {
            return fail("embedding.dimensions must be positive");
        }
        if self.storage.read_pool_size == 0 {
            return fail("storage.read_pool_size must be positive");
        }
        if self.storage.scan_page_size == 0 {
            return fail("storage.scan_page_size must be positive");
        }
        if self.index.fields.is_empty() {
            return fail("index.fields must name at least one field");
        }
        if self.index.dense.insert_batch_size == 0 {
            return fail("index.dense.insert_batch_size must be positive");
        }
        if self.index.dense.structure == DenseStructure::Ivf {
            if self.index.dense.n_lists == 0 {
                return fail("index.dense.n_lists must be positive");
            }
            if self.index.dense.n_probe == 0 || self.index.dense.n_probe > self.index.dense.n_lists {
                return fail("index.dense.n_probe must be in 1..=n_lists");
            }
        }
        if !(0.0..=1.0).contains(&self.index.hybrid.dense_weight) {
            return fail("index.hybrid.dense_weight must be within [0, 1]");
        }
        if self.index.hybrid.candidate_multiplier == 0 {
            return fail("index.hybrid.candidate_multiplier must be positive");
        }
        if self.retrieval.top_k == 0 {
            return fail("retrieval.top_k must be positive");
        }
        if self.retrieval.filter_oversample == 0 {
            return fail("retrieval.filter_oversample must be positive");
        }
        Ok(())
    }
}
