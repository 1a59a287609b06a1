use serde::{Deserialize, Serialize};

use super::defaults;

/// Content store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the record log and offset index.
    pub data_dir: String,
    /// fsync the record log after every append batch.
    pub sync_writes: bool,
    /// Number of read slots in the pool.
    pub read_pool_size: usize,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Records fetched per offset-index page during a scan.
    pub scan_page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::DEFAULT_DATA_DIR.to_string(),
            sync_writes: defaults::DEFAULT_SYNC_WRITES,
            read_pool_size: defaults::DEFAULT_READ_POOL_SIZE,
            busy_timeout_ms: defaults::DEFAULT_BUSY_TIMEOUT_MS,
            scan_page_size: defaults::DEFAULT_SCAN_PAGE_SIZE,
        }
    }
}
