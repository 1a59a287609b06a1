//! Sparse lexical index: BM25 over tokenized indexed fields.

pub mod bm25;
pub mod tokenizer;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use quarry_core::config::{BackendVariant, SparseIndexConfig};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::RecordId;
use quarry_core::traits::ITokenizer;

use crate::backend::{
    BuildContext, IndexBackend, IndexBuilder, IndexHandle, IndexItem, ScoredId, SearchQuery,
};
use crate::corrupt;
use crate::manifest::IndexManifest;
use bm25::{Bm25Builder, Bm25Index};
pub use tokenizer::SimpleTokenizer;

pub struct SparseBackend {
    config: SparseIndexConfig,
}

impl SparseBackend {
    pub fn new(config: SparseIndexConfig) -> Self {
        Self { config }
    }
}

impl IndexBackend for SparseBackend {
    fn variant(&self) -> BackendVariant {
        BackendVariant::Sparse
    }

    fn begin(&self, staging_dir: &Path, ctx: &BuildContext) -> QuarryResult<Box<dyn IndexBuilder>> {
        Ok(Box::new(SparseBuilder::new(
            staging_dir,
            &self.config,
            ctx.require_tokenizer()?,
        )))
    }

    fn open(
        &self,
        dir: &Path,
        manifest: &IndexManifest,
        ctx: &BuildContext,
    ) -> QuarryResult<Arc<dyn IndexHandle>> {
        let index = SparseIndex::open_for(dir, ctx.require_tokenizer()?, manifest)?;
        Ok(Arc::new(SparseHandle {
            manifest: manifest.clone(),
            index,
        }))
    }
}

pub struct SparseBuilder {
    bm25: Bm25Builder,
    tokenizer: Arc<dyn ITokenizer>,
}

impl SparseBuilder {
    pub fn new(dir: &Path, config: &SparseIndexConfig, tokenizer: Arc<dyn ITokenizer>) -> Self {
        Self {
            bm25: Bm25Builder::new(dir, config.k1, config.b),
            tokenizer,
        }
    }

    pub fn push(&mut self, id: RecordId, text: &str) {
        let tokens = self.tokenizer.tokenize(text);
        self.bm25.add(id, &tokens);
    }

    pub fn finish_files(self) -> QuarryResult<Vec<String>> {
        Ok(vec![self.bm25.finish()?])
    }
}

impl IndexBuilder for SparseBuilder {
    fn add_batch(&mut self, items: &[IndexItem]) -> QuarryResult<()> {
        for item in items {
            let text = item.text.as_deref().ok_or_else(|| QuarryError::InvalidArgument {
                reason: format!("record {} has no text", item.id),
            })?;
            self.push(item.id, text);
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> QuarryResult<Vec<String>> {
        (*self).finish_files()
    }
}

pub struct SparseIndex {
    bm25: Bm25Index,
    tokenizer: Arc<dyn ITokenizer>,
}

impl SparseIndex {
    pub fn load(dir: &Path, tokenizer: Arc<dyn ITokenizer>) -> QuarryResult<Self> {
        Ok(Self {
            bm25: Bm25Index::load(dir)?,
            tokenizer,
        })
    }

    pub(crate) fn open_for(
        dir: &Path,
        tokenizer: Arc<dyn ITokenizer>,
        manifest: &IndexManifest,
    ) -> QuarryResult<Self> {
        let index = Self::load(dir, tokenizer)?;
        if index.len() as u64 != manifest.record_count {
            return Err(corrupt(
                dir,
                format!(
                    "{} indexed documents, manifest records {}",
                    index.len(),
                    manifest.record_count
                ),
            ));
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.bm25.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bm25.is_empty()
    }

    pub fn search(&self, text: &str, k: usize) -> Vec<ScoredId> {
        let tokens = self.tokenizer.tokenize(text);
        self.bm25.search(&tokens, k)
    }
}

pub struct SparseHandle {
    manifest: IndexManifest,
    index: SparseIndex,
}

impl IndexHandle for SparseHandle {
    fn search(&self, query: &SearchQuery, k: usize) -> QuarryResult<Vec<ScoredId>> {
        let hits = self.index.search(query.require_text()?, k);
        debug!(k, hits = hits.len(), "sparse search");
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }
}
