//! ContentStore: owns the log writer, the offset index writer connection and
//! the read slot pool.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use quarry_core::config::StorageConfig;
use quarry_core::constants::{RECORD_INDEX_FILE, RECORD_LOG_FILE};
use quarry_core::errors::{QuarryError, QuarryResult, StorageError};
use quarry_core::models::{FieldMap, Record, RecordId};

use crate::offset_index::{self, FrameLocation};
use crate::pool::pragmas::{apply_pragmas, verify_wal_mode};
use crate::pool::ReadPool;
use crate::record_log::{self, LogWriter};
use crate::recovery::{self, RecoveryReport};
use crate::scan::RecordScan;
use crate::{io_err, to_storage_err};

struct Writer {
    conn: Connection,
    log: LogWriter,
    next_id: RecordId,
}

/// Durable, content-addressed record store.
///
/// Writes go through a single writer; reads round-robin over a pool of
/// slots and never block each other.
pub struct ContentStore {
    dir: PathBuf,
    writer: Mutex<Writer>,
    readers: ReadPool,
    scan_page_size: usize,
    recovery: RecoveryReport,
}

impl ContentStore {
    /// Open (or create) a store under `dir` and recover any unindexed log tail.
    pub fn open(dir: &Path, config: &StorageConfig) -> QuarryResult<Self> {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let db_path = dir.join(RECORD_INDEX_FILE);
        let log_path = dir.join(RECORD_LOG_FILE);

        let mut conn = Connection::open(&db_path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn, config.busy_timeout_ms, config.sync_writes)?;
        if !verify_wal_mode(&conn)? {
            warn!(path = %db_path.display(), "offset index not in WAL mode, readers may wait on the writer");
        }
        offset_index::ensure_schema(&conn)?;

        let mut log = LogWriter::open(&log_path, config.sync_writes)?;
        let recovery = recovery::recover(&mut conn, &mut log)?;
        let next_id = offset_index::max_id(&conn)? + 1;

        let readers = ReadPool::open(
            &db_path,
            &log_path,
            config.read_pool_size,
            config.busy_timeout_ms,
        )?;

        info!(
            dir = %dir.display(),
            records = next_id - 1,
            read_slots = readers.size(),
            "content store opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            writer: Mutex::new(Writer { conn, log, next_id }),
            readers,
            scan_page_size: config.scan_page_size,
            recovery,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// What recovery did when this store was opened.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Store a record. Identical content returns the existing id.
    pub fn put(&self, fields: FieldMap) -> QuarryResult<RecordId> {
        self.put_many(vec![fields])?
            .into_iter()
            .next()
            .ok_or_else(|| to_storage_err("put produced no id".to_string()))
    }

    /// Store many records in one log append and one index transaction.
    /// Returns one id per input, in input order; duplicates share an id.
    pub fn put_many(&self, batch: Vec<FieldMap>) -> QuarryResult<Vec<RecordId>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let hashed = batch
            .into_iter()
            .map(|fields| Record::compute_content_hash(&fields).map(|hash| (hash, fields)))
            .collect::<QuarryResult<Vec<_>>>()?;

        let mut guard = self.lock_writer()?;
        let writer = &mut *guard;

        let mut ids = Vec::with_capacity(hashed.len());
        let mut seen: HashMap<String, RecordId> = HashMap::new();
        let mut frames = Vec::new();
        let mut pending: Vec<(FrameLocation, String)> = Vec::new();
        let start = writer.log.end();

        for (hash, fields) in hashed {
            if let Some(&id) = seen.get(&hash) {
                ids.push(id);
                continue;
            }
            if let Some(id) = offset_index::find_by_hash(&writer.conn, &hash)? {
                seen.insert(hash, id);
                ids.push(id);
                continue;
            }
            let id = writer.next_id + pending.len() as RecordId;
            let record = Record {
                id,
                content_hash: hash,
                fields,
            };
            let frame = record_log::encode_frame(&record)?;
            let loc = FrameLocation {
                id,
                offset: start + frames.len() as u64,
                length: frame.len() as u64,
            };
            frames.extend_from_slice(&frame);
            seen.insert(record.content_hash.clone(), id);
            pending.push((loc, record.content_hash));
            ids.push(id);
        }

        if pending.is_empty() {
            return Ok(ids);
        }

        writer.log.append(&frames)?;
        if let Err(e) = commit_locations(&mut writer.conn, &pending) {
            writer.log.truncate(start)?;
            return Err(e);
        }
        writer.next_id += pending.len() as RecordId;

        debug!(
            written = pending.len(),
            deduplicated = ids.len() - pending.len(),
            "records appended"
        );
        Ok(ids)
    }

    /// Fetch a record by id.
    pub fn get(&self, id: RecordId) -> QuarryResult<Record> {
        let log_path = self.dir.join(RECORD_LOG_FILE);
        self.readers.with_slot(|slot| {
            let loc = offset_index::locate(&slot.conn, id)?
                .ok_or_else(|| QuarryError::not_found(format!("record {id}")))?;
            let mut record = record_log::read_frame(&mut slot.log, &log_path, loc.offset, loc.length)?;
            record.id = id;
            Ok(record)
        })
    }

    /// Fetch several records through one read slot, in the order given.
    pub fn get_many(&self, ids: &[RecordId]) -> QuarryResult<Vec<Record>> {
        let log_path = self.dir.join(RECORD_LOG_FILE);
        self.readers.with_slot(|slot| {
            ids.iter()
                .map(|&id| {
                    let loc = offset_index::locate(&slot.conn, id)?
                        .ok_or_else(|| QuarryError::not_found(format!("record {id}")))?;
                    let mut record =
                        record_log::read_frame(&mut slot.log, &log_path, loc.offset, loc.length)?;
                    record.id = id;
                    Ok(record)
                })
                .collect()
        })
    }

    pub fn find_by_hash(&self, content_hash: &str) -> QuarryResult<Option<RecordId>> {
        self.readers
            .with_slot(|slot| offset_index::find_by_hash(&slot.conn, content_hash))
    }

    pub fn len(&self) -> QuarryResult<u64> {
        self.readers.with_slot(|slot| offset_index::count(&slot.conn))
    }

    pub fn is_empty(&self) -> QuarryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterate all records in ascending id order.
    pub fn scan(&self) -> RecordScan<'_> {
        RecordScan::new(self, 0, self.scan_page_size)
    }

    /// Iterate records with id greater than `after`.
    pub fn scan_after(&self, after: RecordId) -> RecordScan<'_> {
        RecordScan::new(self, after, self.scan_page_size)
    }

    pub(crate) fn read_page(&self, after: RecordId, limit: usize) -> QuarryResult<Vec<Record>> {
        let log_path = self.dir.join(RECORD_LOG_FILE);
        self.readers.with_slot(|slot| {
            let locations = offset_index::page_after(&slot.conn, after, limit)?;
            locations
                .into_iter()
                .map(|loc| {
                    let mut record =
                        record_log::read_frame(&mut slot.log, &log_path, loc.offset, loc.length)?;
                    record.id = loc.id;
                    Ok(record)
                })
                .collect()
        })
    }

    fn lock_writer(&self) -> QuarryResult<MutexGuard<'_, Writer>> {
        self.writer.lock().map_err(|_| {
            StorageError::LockPoisoned {
                resource: "content store writer".to_string(),
            }
            .into()
        })
    }
}

fn commit_locations(conn: &mut Connection, rows: &[(FrameLocation, String)]) -> QuarryResult<()> {
    let tx = conn
        .transaction()
        .map_err(|e| to_storage_err(e.to_string()))?;
    for (loc, hash) in rows {
        offset_index::insert(&tx, *loc, hash)?;
    }
    tx.commit().map_err(|e| to_storage_err(e.to_string()))
}
