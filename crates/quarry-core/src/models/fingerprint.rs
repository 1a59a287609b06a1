use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an encoder or tokenizer configuration.
///
/// Cached embeddings and persisted indexes record the fingerprint they were
/// produced with; any difference makes them stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub model: String,
    pub version: String,
    /// Output dimensionality. Zero for tokenizers.
    pub dimensions: usize,
}

impl Fingerprint {
    pub fn new(model: impl Into<String>, version: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            version: version.into(),
            dimensions,
        }
    }

    /// Stable short digest used as a cache key component.
    pub fn digest(&self) -> String {
        let canonical = format!("{}\u{1f}{}\u{1f}{}", self.model, self.version, self.dimensions);
        let hex = blake3::hash(canonical.as_bytes()).to_hex();
        hex[..16].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.model, self.version, self.dimensions)
    }
}
