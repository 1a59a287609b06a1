//! Queries over the `records` offset table.

use rusqlite::{params, Connection, OptionalExtension};

use quarry_core::errors::QuarryResult;
use quarry_core::models::RecordId;

use crate::to_storage_err;

/// Location of a frame in the record log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    pub id: RecordId,
    pub offset: u64,
    pub length: u64,
}

pub fn ensure_schema(conn: &Connection) -> QuarryResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            id           INTEGER PRIMARY KEY,
            content_hash TEXT    NOT NULL UNIQUE,
            offset       INTEGER NOT NULL,
            length       INTEGER NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn insert(conn: &Connection, loc: FrameLocation, content_hash: &str) -> QuarryResult<()> {
    conn.execute(
        "INSERT INTO records (id, content_hash, offset, length) VALUES (?1, ?2, ?3, ?4)",
        params![loc.id as i64, content_hash, loc.offset as i64, loc.length as i64],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn find_by_hash(conn: &Connection, content_hash: &str) -> QuarryResult<Option<RecordId>> {
    conn.query_row(
        "SELECT id FROM records WHERE content_hash = ?1",
        params![content_hash],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|id| id.map(|id| id as RecordId))
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn locate(conn: &Connection, id: RecordId) -> QuarryResult<Option<FrameLocation>> {
    conn.query_row(
        "SELECT offset, length FROM records WHERE id = ?1",
        params![id as i64],
        |row| {
            Ok(FrameLocation {
                id,
                offset: row.get::<_, i64>(0)? as u64,
                length: row.get::<_, i64>(1)? as u64,
            })
        },
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Up to `limit` locations with id greater than `after`, ascending.
pub fn page_after(conn: &Connection, after: RecordId, limit: usize) -> QuarryResult<Vec<FrameLocation>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, offset, length FROM records WHERE id > ?1 ORDER BY id LIMIT ?2",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![after as i64, limit as i64], |row| {
            Ok(FrameLocation {
                id: row.get::<_, i64>(0)? as RecordId,
                offset: row.get::<_, i64>(1)? as u64,
                length: row.get::<_, i64>(2)? as u64,
            })
        })
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

pub fn max_id(conn: &Connection) -> QuarryResult<RecordId> {
    conn.query_row("SELECT COALESCE(MAX(id), 0) FROM records", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|id| id as RecordId)
    .map_err(|e| to_storage_err(e.to_string()))
}

/// End offset of the furthest indexed frame.
pub fn indexed_end(conn: &Connection) -> QuarryResult<u64> {
    conn.query_row(
        "SELECT COALESCE(MAX(offset + length), 0) FROM records",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|end| end as u64)
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn count(conn: &Connection) -> QuarryResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
        .map_err(|e| to_storage_err(e.to_string()))
}
