//! # quarry-store
//!
//! Durable record storage: an append-only framed log holds record payloads,
//! a SQLite table maps record ids and content hashes to log offsets.
//! A record becomes visible to readers once its offset row commits.

pub mod engine;
pub mod offset_index;
pub mod pool;
pub mod record_log;
pub mod recovery;
pub mod scan;

use std::path::Path;

use quarry_core::errors::{QuarryError, StorageError};

pub use engine::ContentStore;
pub use recovery::RecoveryReport;
pub use scan::RecordScan;

/// Map a SQLite failure into the workspace error type.
pub(crate) fn to_storage_err(message: String) -> QuarryError {
    StorageError::SqliteError { message }.into()
}

/// Map an I/O failure on `path` into the workspace error type.
pub(crate) fn io_err(path: &Path, e: std::io::Error) -> QuarryError {
    StorageError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
    .into()
}
