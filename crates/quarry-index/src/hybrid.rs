//! Hybrid index: a dense and a sparse sub-index fused at query time.
//!
//! Weighted fusion min-max normalizes each candidate list to [0, 1] and sums
//! `w * dense + (1 - w) * sparse`; a record missing from one list gets 0 for
//! it. Sparse candidates sharing no query term are dropped before fusion.
//! RRF sums `1 / (k + rank)` with 1-based ranks.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use quarry_core::config::{
    BackendVariant, DenseIndexConfig, FusionRule, HybridIndexConfig, SparseIndexConfig,
};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::RecordId;

use crate::backend::{
    BuildContext, IndexBackend, IndexBuilder, IndexHandle, IndexItem, ScoredId, SearchQuery,
};
use crate::dense::{DenseBuilder, DenseIndex};
use crate::io_err;
use crate::manifest::IndexManifest;
use crate::sparse::{SparseBuilder, SparseIndex};
use crate::topk::sort_ranked;

const DENSE_DIR: &str = "dense";
const SPARSE_DIR: &str = "sparse";

pub struct HybridBackend {
    dense: DenseIndexConfig,
    sparse: SparseIndexConfig,
    hybrid: HybridIndexConfig,
}

impl HybridBackend {
    pub fn new(dense: DenseIndexConfig, sparse: SparseIndexConfig, hybrid: HybridIndexConfig) -> Self {
        Self {
            dense,
            sparse,
            hybrid,
        }
    }
}

impl IndexBackend for HybridBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Hybrid
    }

    fn begin(&self, staging_dir: &Path, ctx: &BuildContext) -> QuarryResult<Box<dyn IndexBuilder>> {
        let dims = ctx.require_dimensions()?;
        let tokenizer = ctx.require_tokenizer()?;
        let dense_dir = staging_dir.join(DENSE_DIR);
        let sparse_dir = staging_dir.join(SPARSE_DIR);
        fs::create_dir_all(&dense_dir).map_err(|e| io_err(&dense_dir, e))?;
        fs::create_dir_all(&sparse_dir).map_err(|e| io_err(&sparse_dir, e))?;
        Ok(Box::new(HybridBuilder {
            dense: DenseBuilder::create(&dense_dir, self.dense.clone(), dims)?,
            sparse: SparseBuilder::new(&sparse_dir, &self.sparse, tokenizer),
        }))
    }

    fn open(
        &self,
        dir: &Path,
        manifest: &IndexManifest,
        ctx: &BuildContext,
    ) -> QuarryResult<Arc<dyn IndexHandle>> {
        let dense = DenseIndex::open_for(&dir.join(DENSE_DIR), &self.dense, manifest)?;
        let sparse = SparseIndex::open_for(&dir.join(SPARSE_DIR), ctx.require_tokenizer()?, manifest)?;
        Ok(Arc::new(HybridHandle {
            manifest: manifest.clone(),
            config: self.hybrid.clone(),
            dense,
            sparse,
        }))
    }
}

struct HybridBuilder {
    dense: DenseBuilder,
    sparse: SparseBuilder,
}

impl IndexBuilder for HybridBuilder {
    fn add_batch(&mut self, items: &[IndexItem]) -> QuarryResult<()> {
        for item in items {
            let (Some(vector), Some(text)) = (item.vector.as_deref(), item.text.as_deref()) else {
                return Err(QuarryError::InvalidArgument {
                    reason: format!("record {} needs both a vector and text", item.id),
                });
            };
            self.dense.push(item.id, vector)?;
            self.sparse.push(item.id, text);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> QuarryResult<Vec<String>> {
        let HybridBuilder { dense, sparse } = *self;
        let mut files: Vec<String> = dense
            .finish_files()?
            .into_iter()
            .map(|f| format!("{DENSE_DIR}/{f}"))
            .collect();
        files.extend(
            sparse
                .finish_files()?
                .into_iter()
                .map(|f| format!("{SPARSE_DIR}/{f}")),
        );
        Ok(files)
    }
}

pub struct HybridHandle {
    manifest: IndexManifest,
    config: HybridIndexConfig,
    dense: DenseIndex,
    sparse: SparseIndex,
}

impl IndexHandle for HybridHandle {
    fn search(&self, query: &SearchQuery, k: usize) -> QuarryResult<Vec<ScoredId>> {
        let vector = query.require_vector()?;
        let text = query.require_text()?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let fetch = k.saturating_mul(self.config.candidate_multiplier);
        let dense = self.dense.search(vector, fetch)?;
        let mut sparse = self.sparse.search(text, fetch);
        // Only lexical matches take part in fusion.
        sparse.retain(|hit| hit.score > 0.0);

        let mut fused = match self.config.fusion {
            FusionRule::Weighted => fuse_weighted(&dense, &sparse, self.config.dense_weight),
            FusionRule::Rrf => fuse_rrf(&[&dense, &sparse], self.config.rrf_k),
        };
        fused.truncate(k);
        debug!(
            k,
            dense = dense.len(),
            sparse = sparse.len(),
            hits = fused.len(),
            fusion = ?self.config.fusion,
            "hybrid search"
        );
        Ok(fused)
    }

    fn len(&self) -> usize {
        self.dense.len()
    }

    fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }
}

/// Scores rescaled to [0, 1]. A list whose scores are all equal maps to 1.
fn min_max(hits: &[ScoredId]) -> BTreeMap<RecordId, f64> {
    let (lo, hi) = hits.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), h| {
        (lo.min(h.score), hi.max(h.score))
    });
    let span = hi - lo;
    hits.iter()
        .map(|h| {
            let norm = if span > 0.0 { (h.score - lo) / span } else { 1.0 };
            (h.id, norm)
        })
        .collect()
}

/// `w * dense + (1 - w) * sparse` over min-max normalized lists.
pub fn fuse_weighted(dense: &[ScoredId], sparse: &[ScoredId], dense_weight: f64) -> Vec<ScoredId> {
    let mut fused: BTreeMap<RecordId, f64> = BTreeMap::new();
    for (id, s) in min_max(dense) {
        *fused.entry(id).or_default() += dense_weight * s;
    }
    for (id, s) in min_max(sparse) {
        *fused.entry(id).or_default() += (1.0 - dense_weight) * s;
    }
    collect_sorted(fused)
}

/// Reciprocal rank fusion: score = Σ 1/(k + rank), rank 1-based.
pub fn fuse_rrf(lists: &[&[ScoredId]], k: u32) -> Vec<ScoredId> {
    let mut fused: BTreeMap<RecordId, f64> = BTreeMap::new();
    for list in lists {
        for (rank, hit) in list.iter().enumerate() {
            *fused.entry(hit.id).or_default() += 1.0 / (k as f64 + (rank + 1) as f64);
        }
    }
    collect_sorted(fused)
}

fn collect_sorted(fused: BTreeMap<RecordId, f64>) -> Vec<ScoredId> {
    let mut hits: Vec<ScoredId> = fused
        .into_iter()
        .map(|(id, score)| ScoredId { id, score })
        .collect();
    sort_ranked(&mut hits);
    hits
}
