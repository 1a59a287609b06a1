mod embedding_error;
mod quarry_error;
mod storage_error;

pub use embedding_error::EmbeddingError;
pub use quarry_error::{QuarryError, QuarryResult};
pub use storage_error::StorageError;
