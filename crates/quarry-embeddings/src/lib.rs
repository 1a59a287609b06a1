//! # quarry-embeddings
//!
//! Turns records into vectors: built-in encoders, a two-tier cache keyed by
//! `(content hash, field, encoder fingerprint)`, a bounded-parallel batch
//! encoder with retry, timeout and cancellation, and a query encoder under the
//! same retry budget.

pub mod batch;
pub mod cache;
pub mod providers;
pub mod query;

use quarry_core::constants::FIELD_LABEL_SEPARATOR;

pub use batch::{BatchEncoder, EncodeReport, EncodedBatch, EncodedRecord};
pub use cache::{CacheKey, CacheStats, EncodeCache};
pub use providers::{create_encoder, HashingEncoder, HttpEncoder};
pub use query::QueryEncoder;

/// Cache field label for a set of indexed fields.
pub fn field_label(fields: &[String]) -> String {
    fields.join(FIELD_LABEL_SEPARATOR)
}
