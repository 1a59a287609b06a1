use crate::errors::QuarryResult;
use crate::models::Fingerprint;

/// External embedding capability.
///
/// Implementations may batch internally or call a remote service. A batch
/// must either return exactly one vector per input or fail; dropping items
/// silently is a contract violation that callers reject as a partial batch.
pub trait IEncoder: Send + Sync {
    /// Embed a batch of texts.
    fn encode_batch(&self, texts: &[String]) -> QuarryResult<Vec<Vec<f32>>>;

    /// The dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    /// Model identity used to validate caches and indexes.
    fn fingerprint(&self) -> Fingerprint;

    /// Human-readable encoder name.
    fn name(&self) -> &str;
}
