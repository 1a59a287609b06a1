//! Round-robin pool of read slots. Each slot pairs a read-only SQLite
//! connection with its own log file handle, so readers never share a cursor.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use quarry_core::errors::{QuarryResult, StorageError};

use super::pragmas::apply_read_pragmas;
use crate::{io_err, to_storage_err};

/// Maximum number of read slots.
const MAX_POOL_SIZE: usize = 16;

/// One reader's resources.
pub struct ReadSlot {
    pub conn: Connection,
    pub log: File,
}

pub struct ReadPool {
    slots: Vec<Mutex<ReadSlot>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open `pool_size` slots (clamped to 1..=16) over an existing database and log.
    pub fn open(
        db_path: &Path,
        log_path: &Path,
        pool_size: usize,
        busy_timeout_ms: u32,
    ) -> QuarryResult<Self> {
        let size = pool_size.clamp(1, MAX_POOL_SIZE);
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(e.to_string()))?;
            apply_read_pragmas(&conn, busy_timeout_ms)?;
            let log = File::open(log_path).map_err(|e| io_err(log_path, e))?;
            slots.push(Mutex::new(ReadSlot { conn, log }));
        }
        Ok(Self {
            slots,
            next: AtomicUsize::new(0),
        })
    }

    /// Run a closure with the next slot in round-robin order.
    pub fn with_slot<F, T>(&self, f: F) -> QuarryResult<T>
    where
        F: FnOnce(&mut ReadSlot) -> QuarryResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let mut guard = self.slots[idx].lock().map_err(|_| StorageError::LockPoisoned {
            resource: format!("read slot {idx}"),
        })?;
        f(&mut guard)
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }
}
