use crate::models::RecordId;

use super::{EmbeddingError, StorageError};

/// Result alias used across the workspace.
pub type QuarryResult<T> = Result<T, QuarryError>;

/// Top-level error taxonomy.
///
/// Cache misses and stale fingerprints never surface here; they are handled
/// locally by recomputing. Query-time `NotFound` and `IndexNotReady` are
/// surfaced as-is because an empty result and an unavailable index are
/// different answers.
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("corrupt index at {path}: {details}")]
    CorruptIndex { path: String, details: String },

    #[error("fingerprint mismatch: index built with {stored}, current is {current}")]
    FingerprintMismatch { stored: String, current: String },

    #[error("index not ready: build or load an index before querying")]
    IndexNotReady,

    #[error("build already in progress for {path}")]
    BuildInProgress { path: String },

    #[error("encode failed for batch at offset {batch_offset}: {reason}")]
    EncodeFailed { batch_offset: usize, reason: String },

    #[error("build failed for batch at offset {batch_offset} after {attempts} attempts: {reason}")]
    BuildFailed {
        batch_offset: usize,
        record_ids: Vec<RecordId>,
        attempts: u32,
        reason: String,
    },

    #[error("cancelled before batch at offset {batch_offset}")]
    Cancelled { batch_offset: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuarryError {
    /// Whether the failure is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuarryError::EncodeFailed { .. }
                | QuarryError::Embedding(
                    EmbeddingError::InferenceFailed { .. }
                        | EmbeddingError::ProviderUnavailable { .. }
                        | EmbeddingError::PartialBatch { .. }
                        | EmbeddingError::Timeout { .. }
                )
        )
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        QuarryError::NotFound { what: what.into() }
    }

    /// Shorthand for a `CorruptIndex` error.
    pub fn corrupt_index(path: impl Into<String>, details: impl Into<String>) -> Self {
        QuarryError::CorruptIndex {
            path: path.into(),
            details: details.into(),
        }
    }
}
