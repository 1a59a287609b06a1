/// Errors raised by encoder implementations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider unavailable: {provider}")]
    ProviderUnavailable { provider: String },

    #[error("partial batch: {returned} vectors returned for {requested} inputs")]
    PartialBatch { requested: usize, returned: usize },

    #[error("encoder call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}
