//! L1 in-memory cache using moka.
//!
//! Bounded hot set; entries may be evicted at any time.

use moka::sync::Cache;

pub struct L1MemoryCache {
    cache: Cache<String, Vec<f32>>,
}

impl L1MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, vector: Vec<f32>) {
        self.cache.insert(key, vector);
    }

    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
