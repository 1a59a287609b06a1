use crate::models::Fingerprint;

/// Splits text into index terms for sparse backends.
pub trait ITokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Identity recorded in sparse index manifests.
    fn fingerprint(&self) -> Fingerprint;
}
