//! Backend traits and the one-time variant selection.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quarry_core::config::{BackendVariant, IndexConfig};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::{Fingerprint, RecordId};
use quarry_core::traits::ITokenizer;

use crate::dense::DenseBackend;
use crate::hybrid::HybridBackend;
use crate::manifest::IndexManifest;
use crate::sparse::SparseBackend;

/// One record handed to a builder.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexItem {
    pub id: RecordId,
    /// Required by dense and hybrid backends.
    pub vector: Option<Vec<f32>>,
    /// Required by sparse and hybrid backends.
    pub text: Option<String>,
}

/// A query as seen by an index handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            vector: None,
        }
    }

    pub fn vector(vector: Vec<f32>) -> Self {
        Self {
            text: None,
            vector: Some(vector),
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    pub(crate) fn require_vector(&self) -> QuarryResult<&[f32]> {
        self.vector.as_deref().ok_or_else(|| QuarryError::InvalidArgument {
            reason: "query vector required by this index".to_string(),
        })
    }

    pub(crate) fn require_text(&self) -> QuarryResult<&str> {
        self.text.as_deref().ok_or_else(|| QuarryError::InvalidArgument {
            reason: "query text required by this index".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: RecordId,
    pub score: f64,
}

/// What a build (or load) is validated against.
#[derive(Clone)]
pub struct BuildContext {
    /// Fingerprint of the encoder producing item and query vectors.
    pub encoder: Option<Fingerprint>,
    pub tokenizer: Option<Arc<dyn ITokenizer>>,
    /// Indexed record fields, recorded in the manifest.
    pub fields: Vec<String>,
    pub verify_checksums: bool,
}

impl BuildContext {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            encoder: None,
            tokenizer: None,
            fields,
            verify_checksums: true,
        }
    }

    pub fn with_encoder(mut self, fingerprint: Fingerprint) -> Self {
        self.encoder = Some(fingerprint);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn ITokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn tokenizer_fingerprint(&self) -> Option<Fingerprint> {
        self.tokenizer.as_ref().map(|t| t.fingerprint())
    }

    pub(crate) fn require_dimensions(&self) -> QuarryResult<usize> {
        match &self.encoder {
            Some(fp) if fp.dimensions > 0 => Ok(fp.dimensions),
            Some(fp) => Err(QuarryError::ConfigError {
                reason: format!("encoder {fp} reports zero dimensions"),
            }),
            None => Err(QuarryError::ConfigError {
                reason: "dense index requires an encoder fingerprint".to_string(),
            }),
        }
    }

    pub(crate) fn require_tokenizer(&self) -> QuarryResult<Arc<dyn ITokenizer>> {
        self.tokenizer.clone().ok_or_else(|| QuarryError::ConfigError {
            reason: "sparse index requires a tokenizer".to_string(),
        })
    }
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("encoder", &self.encoder)
            .field("tokenizer", &self.tokenizer_fingerprint())
            .field("fields", &self.fields)
            .field("verify_checksums", &self.verify_checksums)
            .finish()
    }
}

/// Factory for builders and handles of one variant.
pub trait IndexBackend: Send + Sync {
    fn variant(&self) -> BackendVariant;

    /// Start writing native files into `staging_dir`.
    fn begin(&self, staging_dir: &Path, ctx: &BuildContext) -> QuarryResult<Box<dyn IndexBuilder>>;

    /// Open a committed index directory whose manifest was already validated.
    fn open(
        &self,
        dir: &Path,
        manifest: &IndexManifest,
        ctx: &BuildContext,
    ) -> QuarryResult<Arc<dyn IndexHandle>>;
}

/// Streams items into native index files.
pub trait IndexBuilder: Send {
    fn add_batch(&mut self, items: &[IndexItem]) -> QuarryResult<()>;

    /// Flush everything; returns the files written, relative to the staging dir.
    fn finish(self: Box<Self>) -> QuarryResult<Vec<String>>;
}

/// Immutable, shareable query view of a committed index.
pub trait IndexHandle: Send + Sync {
    /// At most `k` hits, descending score, ties by ascending record id.
    fn search(&self, query: &SearchQuery, k: usize) -> QuarryResult<Vec<ScoredId>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn manifest(&self) -> &IndexManifest;
}

/// Select the backend for the configured variant.
pub fn create_backend(config: &IndexConfig) -> Arc<dyn IndexBackend> {
    match config.variant {
        BackendVariant::Dense => Arc::new(DenseBackend::new(config.dense.clone())),
        BackendVariant::Sparse => Arc::new(SparseBackend::new(config.sparse.clone())),
        BackendVariant::Hybrid => Arc::new(HybridBackend::new(
            config.dense.clone(),
            config.sparse.clone(),
            config.hybrid.clone(),
        )),
    }
}
