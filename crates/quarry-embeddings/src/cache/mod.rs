//! Two-tier encode cache: L1 moka hot set in front of an optional L2 SQLite
//! table. Lookups go L1 → L2; L2 hits are promoted. Writes go through both.
//!
//! Entries are keyed by the blake3 hash of the encoded text, never by record
//! id, so stores sharing one cache file cannot read each other's vectors for
//! different content. An entry is only ever returned for the exact
//! fingerprint digest it was written under, so bumping the encoder version
//! turns every old row into a miss. L2 read failures are logged and treated
//! as misses.

pub mod l1_memory;
pub mod l2_sqlite;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use quarry_core::config::EmbeddingConfig;
use quarry_core::errors::QuarryResult;
use quarry_core::models::Fingerprint;

use l1_memory::L1MemoryCache;
use l2_sqlite::L2SqliteCache;

/// Identity of one cached vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// blake3 hex digest of the encoder input.
    pub content_hash: String,
    pub field: String,
    /// Encoder fingerprint digest.
    pub fingerprint: String,
    /// Expected vector length.
    pub dimensions: usize,
}

impl CacheKey {
    pub fn new(text: &str, field: impl Into<String>, fingerprint: &Fingerprint) -> Self {
        Self {
            content_hash: content_hash(text),
            field: field.into(),
            fingerprint: fingerprint.digest(),
            dimensions: fingerprint.dimensions,
        }
    }

    fn l1_key(&self) -> String {
        format!("{}\u{1f}{}\u{1f}{}", self.fingerprint, self.content_hash, self.field)
    }

    fn accepts(&self, vector: &[f32]) -> bool {
        self.dimensions == 0 || vector.len() == self.dimensions
    }
}

/// Content hash of an encoder input.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Hit/miss counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
}

pub struct EncodeCache {
    l1: L1MemoryCache,
    l2: Option<L2SqliteCache>,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
}

impl EncodeCache {
    /// Build from configuration. The L2 table lives at `embedding.cache_path`
    /// when `l2_cache_enabled` is set.
    pub fn open(config: &EmbeddingConfig) -> QuarryResult<Self> {
        let l2 = if config.l2_cache_enabled {
            Some(L2SqliteCache::open(
                Path::new(&config.cache_path),
                config.cache_max_entries,
            )?)
        } else {
            None
        };
        Ok(Self::with_tiers(L1MemoryCache::new(config.l1_cache_size), l2))
    }

    /// L1-only cache; nothing survives the process.
    pub fn memory_only(l1_size: u64) -> Self {
        Self::with_tiers(L1MemoryCache::new(l1_size), None)
    }

    fn with_tiers(l1: L1MemoryCache, l2: Option<L2SqliteCache>) -> Self {
        Self {
            l1,
            l2,
            l1_hits: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, text: &str, field: &str, fingerprint: &Fingerprint) -> Option<Vec<f32>> {
        let key = CacheKey::new(text, field, fingerprint);
        self.get_many(std::slice::from_ref(&key)).pop().flatten()
    }

    pub fn put(
        &self,
        text: &str,
        field: &str,
        fingerprint: &Fingerprint,
        vector: &[f32],
    ) -> QuarryResult<()> {
        let key = CacheKey::new(text, field, fingerprint);
        self.put_many(&[(key, vector.to_vec())])
    }

    /// Look up many keys. At most one L2 round-trip per call.
    pub fn get_many(&self, keys: &[CacheKey]) -> Vec<Option<Vec<f32>>> {
        let mut out: Vec<Option<Vec<f32>>> = keys
            .iter()
            .map(|k| self.l1.get(&k.l1_key()).filter(|v| k.accepts(v)))
            .collect();
        let l1_hits = out.iter().filter(|v| v.is_some()).count() as u64;
        self.l1_hits.fetch_add(l1_hits, Ordering::Relaxed);

        let missing: Vec<usize> = (0..keys.len()).filter(|&i| out[i].is_none()).collect();
        if missing.is_empty() {
            return out;
        }

        let mut l2_hits = 0u64;
        if let Some(l2) = &self.l2 {
            let lookup: Vec<&CacheKey> = missing.iter().map(|&i| &keys[i]).collect();
            match l2.get_many(&lookup) {
                Ok(found) => {
                    for (&i, vector) in missing.iter().zip(found) {
                        if let Some(v) = vector.filter(|v| keys[i].accepts(v)) {
                            self.l1.insert(keys[i].l1_key(), v.clone());
                            out[i] = Some(v);
                            l2_hits += 1;
                        }
                    }
                }
                Err(e) => warn!(error = %e, keys = lookup.len(), "L2 cache read failed, treating as miss"),
            }
        }
        self.l2_hits.fetch_add(l2_hits, Ordering::Relaxed);
        self.misses
            .fetch_add(missing.len() as u64 - l2_hits, Ordering::Relaxed);

        debug!(
            requested = keys.len(),
            l1_hits,
            l2_hits,
            "encode cache lookup"
        );
        out
    }

    /// Write many entries: one L2 transaction, then L1. Same-key writes are
    /// last-write-wins.
    pub fn put_many(&self, entries: &[(CacheKey, Vec<f32>)]) -> QuarryResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(l2) = &self.l2 {
            l2.put_many(entries)?;
        }
        for (key, vector) in entries {
            self.l1.insert(key.l1_key(), vector.clone());
        }
        Ok(())
    }

    /// Drop every entry not produced by `current`. Returns L2 rows deleted.
    pub fn purge_stale(&self, current: &Fingerprint) -> QuarryResult<usize> {
        self.l1.clear();
        match &self.l2 {
            Some(l2) => {
                let removed = l2.purge_except(&current.digest())?;
                debug!(removed, current = %current, "purged stale embeddings");
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    /// Rows in the persistent tier, if any.
    pub fn persisted_len(&self) -> QuarryResult<u64> {
        match &self.l2 {
            Some(l2) => l2.len(),
            None => Ok(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Forget the in-memory tier. Used to exercise L2 reads.
    pub fn clear_memory(&self) {
        self.l1.clear();
    }
}
