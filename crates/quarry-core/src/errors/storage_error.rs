/// Storage-layer errors for the record log, offset index and embedding cache.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("I/O error on {path}: {message}")]
    IoError { path: String, message: String },

    #[error("corrupt record log at offset {offset}: {details}")]
    CorruptLog { offset: u64, details: String },

    #[error("lock poisoned: {resource}")]
    LockPoisoned { resource: String },
}
