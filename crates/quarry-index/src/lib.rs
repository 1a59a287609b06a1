//! # quarry-index
//!
//! Pluggable index backends over encoded records. A backend is chosen once
//! from `IndexConfig` by [`create_backend`]; builds run through a
//! [`BuildSession`] that publishes a directory atomically, and queries go
//! through an immutable [`IndexHandle`] held in an [`IndexSlot`].

pub mod backend;
pub mod build;
pub mod dense;
pub mod hybrid;
pub mod manifest;
pub mod slot;
pub mod sparse;
pub mod topk;

use std::path::Path;

use quarry_core::errors::{QuarryError, StorageError};

pub use backend::{
    create_backend, BuildContext, IndexBackend, IndexBuilder, IndexHandle, IndexItem, ScoredId,
    SearchQuery,
};
pub use build::{load_index, BuildSession};
pub use manifest::{FileChecksum, IndexManifest};
pub use slot::IndexSlot;
pub use sparse::SimpleTokenizer;

pub(crate) fn io_err(path: &Path, e: std::io::Error) -> QuarryError {
    QuarryError::Storage(StorageError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// A native index file that is missing or malformed.
pub(crate) fn corrupt(path: &Path, details: impl Into<String>) -> QuarryError {
    QuarryError::corrupt_index(path.display().to_string(), details)
}
