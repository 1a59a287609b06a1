//! L2 SQLite-backed embedding cache.
//!
//! Rows are keyed by `(content_hash, field, fingerprint)` and carry the stored
//! dimension count. A blob whose length disagrees with that count is a miss.
//! With a capacity set, a `last_used` counter drives LRU eviction.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use quarry_core::errors::{QuarryError, QuarryResult, StorageError};

use super::CacheKey;

fn sql_err(e: rusqlite::Error) -> QuarryError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
    .into()
}

pub struct L2SqliteCache {
    conn: Mutex<Connection>,
    max_entries: Option<u64>,
    clock: AtomicU64,
}

impl L2SqliteCache {
    pub fn open(path: &Path, max_entries: Option<u64>) -> QuarryResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(sql_err)?;
        Self::init(conn, max_entries)
    }

    pub fn open_in_memory(max_entries: Option<u64>) -> QuarryResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        Self::init(conn, max_entries)
    }

    fn init(conn: Connection, max_entries: Option<u64>) -> QuarryResult<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            CREATE TABLE IF NOT EXISTS embeddings (
                content_hash TEXT    NOT NULL,
                field        TEXT    NOT NULL,
                fingerprint  TEXT    NOT NULL,
                dims         INTEGER NOT NULL,
                vector       BLOB    NOT NULL,
                last_used    INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (content_hash, field, fingerprint)
            );
            CREATE INDEX IF NOT EXISTS idx_embeddings_last_used ON embeddings(last_used);
            ",
        )
        .map_err(sql_err)?;
        let clock: i64 = conn
            .query_row("SELECT COALESCE(MAX(last_used), 0) FROM embeddings", [], |r| r.get(0))
            .map_err(sql_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries,
            clock: AtomicU64::new(clock as u64),
        })
    }

    fn lock(&self) -> QuarryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            StorageError::LockPoisoned {
                resource: "embedding cache".to_string(),
            }
            .into()
        })
    }

    fn tick(&self) -> i64 {
        (self.clock.fetch_add(1, Ordering::Relaxed) + 1) as i64
    }

    /// Look up many keys in one lock hold. Hits refresh `last_used` when a
    /// capacity is configured.
    pub fn get_many(&self, keys: &[&CacheKey]) -> QuarryResult<Vec<Option<Vec<f32>>>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(sql_err)?;
        let mut out = Vec::with_capacity(keys.len());
        {
            let mut select = tx
                .prepare_cached(
                    "SELECT dims, vector FROM embeddings
                     WHERE content_hash = ?1 AND field = ?2 AND fingerprint = ?3",
                )
                .map_err(sql_err)?;
            let mut touch = tx
                .prepare_cached(
                    "UPDATE embeddings SET last_used = ?4
                     WHERE content_hash = ?1 AND field = ?2 AND fingerprint = ?3",
                )
                .map_err(sql_err)?;
            for key in keys {
                let row: Option<(i64, Vec<u8>)> = select
                    .query_row(
                        params![key.content_hash, key.field, key.fingerprint],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()
                    .map_err(sql_err)?;
                let vector = row.and_then(|(dims, blob)| decode(&blob, dims as usize));
                if vector.is_some() && self.max_entries.is_some() {
                    touch
                        .execute(params![
                            key.content_hash,
                            key.field,
                            key.fingerprint,
                            self.tick()
                        ])
                        .map_err(sql_err)?;
                }
                out.push(vector);
            }
        }
        tx.commit().map_err(sql_err)?;
        Ok(out)
    }

    /// Insert or replace many rows in one transaction, then evict down to
    /// capacity.
    pub fn put_many(&self, entries: &[(CacheKey, Vec<f32>)]) -> QuarryResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(sql_err)?;
        {
            let mut insert = tx
                .prepare_cached(
                    "INSERT OR REPLACE INTO embeddings
                     (content_hash, field, fingerprint, dims, vector, last_used)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(sql_err)?;
            for (key, vector) in entries {
                insert
                    .execute(params![
                        key.content_hash,
                        key.field,
                        key.fingerprint,
                        vector.len() as i64,
                        encode(vector),
                        self.tick()
                    ])
                    .map_err(sql_err)?;
            }
        }
        if let Some(max) = self.max_entries {
            let count: i64 = tx
                .query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))
                .map_err(sql_err)?;
            let excess = count - max as i64;
            if excess > 0 {
                tx.execute(
                    "DELETE FROM embeddings WHERE rowid IN
                     (SELECT rowid FROM embeddings ORDER BY last_used ASC LIMIT ?1)",
                    params![excess],
                )
                .map_err(sql_err)?;
                debug!(evicted = excess, "L2 cache eviction");
            }
        }
        tx.commit().map_err(sql_err)
    }

    /// Delete rows produced by any fingerprint other than `current`.
    pub fn purge_except(&self, current: &str) -> QuarryResult<usize> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM embeddings WHERE fingerprint != ?1",
            params![current],
        )
        .map_err(sql_err)
    }

    pub fn len(&self) -> QuarryResult<u64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(sql_err)
    }

    /// Overwrite a row's blob without touching its dims column.
    #[cfg(test)]
    pub(crate) fn corrupt_blob(&self, key: &CacheKey, blob: &[u8]) -> QuarryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE embeddings SET vector = ?4
             WHERE content_hash = ?1 AND field = ?2 AND fingerprint = ?3",
            params![key.content_hash, key.field, key.fingerprint, blob],
        )
        .map_err(sql_err)?;
        Ok(())
    }
}

fn encode(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode(blob: &[u8], dims: usize) -> Option<Vec<f32>> {
    if blob.len() != dims * 4 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
