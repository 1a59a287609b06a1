//! Startup recovery for the record log.
//!
//! Frames past the last indexed offset were appended by a writer that did
//! not get to commit their offset rows. They are re-indexed (skipping
//! content already present) and a torn trailing frame is truncated.

use std::fs::File;

use rusqlite::Connection;
use tracing::{info, warn};

use quarry_core::errors::{QuarryResult, StorageError};

use crate::offset_index::{self, FrameLocation};
use crate::record_log::{self, FrameRead, LogWriter};
use crate::{io_err, to_storage_err};

/// What recovery found on open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Unindexed frames that were added to the offset index.
    pub reindexed: usize,
    /// Unindexed frames whose content was already indexed.
    pub duplicates: usize,
    /// Bytes cut from a torn log tail.
    pub truncated_bytes: u64,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.reindexed == 0 && self.duplicates == 0 && self.truncated_bytes == 0
    }
}

pub(crate) fn recover(conn: &mut Connection, log: &mut LogWriter) -> QuarryResult<RecoveryReport> {
    let mut report = RecoveryReport::default();
    let file_len = log.end();
    let indexed_end = offset_index::indexed_end(conn)?;
    if indexed_end > file_len {
        return Err(StorageError::CorruptLog {
            offset: file_len,
            details: format!("offset index reaches byte {indexed_end} beyond end of log"),
        }
        .into());
    }
    if indexed_end == file_len {
        return Ok(report);
    }

    let path = log.path().to_path_buf();
    let mut file = File::open(&path).map_err(|e| io_err(&path, e))?;
    let mut next_id = offset_index::max_id(conn)? + 1;
    let mut offset = indexed_end;
    let mut torn_at = None;

    let tx = conn
        .transaction()
        .map_err(|e| to_storage_err(e.to_string()))?;
    loop {
        match record_log::read_next(&mut file, &path, offset, file_len)? {
            FrameRead::End => break,
            FrameRead::Torn { reason } => {
                warn!(offset, reason = %reason, "torn frame at end of record log");
                torn_at = Some(offset);
                break;
            }
            FrameRead::Frame { record, length } => {
                if offset_index::find_by_hash(&tx, &record.content_hash)?.is_some() {
                    report.duplicates += 1;
                } else {
                    let id = record.id.max(next_id);
                    offset_index::insert(&tx, FrameLocation { id, offset, length }, &record.content_hash)?;
                    next_id = id + 1;
                    report.reindexed += 1;
                }
                offset += length;
            }
        }
    }
    tx.commit().map_err(|e| to_storage_err(e.to_string()))?;

    if let Some(at) = torn_at {
        log.truncate(at)?;
        report.truncated_bytes = file_len - at;
    }

    info!(
        reindexed = report.reindexed,
        duplicates = report.duplicates,
        truncated_bytes = report.truncated_bytes,
        "record log recovered"
    );
    Ok(report)
}
