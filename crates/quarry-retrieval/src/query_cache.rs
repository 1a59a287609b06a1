//! Query-side caches: encoded query vectors and finished results.

use std::sync::Arc;

use moka::sync::Cache;

use quarry_core::errors::QuarryResult;
use quarry_core::models::{FieldFilter, RetrievedContext};

/// Query vectors keyed by blake3 of the query text.
///
/// Entries are only valid for the encoder that produced them; the owning
/// retriever never changes encoder.
pub struct QueryVectorCache {
    cache: Cache<String, Arc<Vec<f32>>>,
}

impl QueryVectorCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub fn key(query: &str) -> String {
        blake3::hash(query.as_bytes()).to_hex().to_string()
    }

    pub fn get(&self, query: &str) -> Option<Arc<Vec<f32>>> {
        self.cache.get(&Self::key(query))
    }

    /// Cached vector for `query`, or the result of `encode`, which is stored.
    pub fn get_or_encode<F>(&self, query: &str, encode: F) -> QuarryResult<Arc<Vec<f32>>>
    where
        F: FnOnce(&str) -> QuarryResult<Vec<f32>>,
    {
        let key = Self::key(query);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let vector = Arc::new(encode(query)?);
        self.cache.insert(key, Arc::clone(&vector));
        Ok(vector)
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identity of a finished query. The index generation is part of the key,
/// so results computed against a replaced index are never served.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultKey {
    pub query: String,
    pub top_k: usize,
    pub filters: Vec<FieldFilter>,
    pub generation: u64,
}

pub struct ResultCache {
    cache: Cache<ResultKey, Arc<Vec<RetrievedContext>>>,
}

impl ResultCache {
    /// `None` when `max_entries` is 0.
    pub fn new(max_entries: u64) -> Option<Self> {
        (max_entries > 0).then(|| Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        })
    }

    pub fn get(&self, key: &ResultKey) -> Option<Arc<Vec<RetrievedContext>>> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: ResultKey, results: Arc<Vec<RetrievedContext>>) {
        self.cache.insert(key, results);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
