//! PRAGMA configuration applied to every offset-index connection.
//!
//! WAL mode so readers never block on the writer; FULL sync when the store
//! is configured for durable writes, NORMAL otherwise.

use rusqlite::Connection;

use quarry_core::errors::QuarryResult;

use crate::to_storage_err;

/// Apply writer pragmas.
pub fn apply_pragmas(conn: &Connection, busy_timeout_ms: u32, sync_writes: bool) -> QuarryResult<()> {
    let synchronous = if sync_writes { "FULL" } else { "NORMAL" };
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = {synchronous};
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA cache_size = -16000;
        "
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Apply reader pragmas. Readers only need the busy timeout and a cache.
pub fn apply_read_pragmas(conn: &Connection, busy_timeout_ms: u32) -> QuarryResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA cache_size = -8000;
        "
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
pub fn verify_wal_mode(conn: &Connection) -> QuarryResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_pragmas_enable_wal() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("records.db")).unwrap();
        assert!(!verify_wal_mode(&conn).unwrap());
        apply_pragmas(&conn, 1000, false).unwrap();
        assert!(verify_wal_mode(&conn).unwrap());
    }

    #[test]
    fn in_memory_databases_are_not_wal() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn, 1000, true).unwrap();
        assert!(!verify_wal_mode(&conn).unwrap());
    }
}
