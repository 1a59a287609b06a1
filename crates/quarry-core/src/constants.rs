/// Quarry version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk index format version written into every manifest.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// File name of the index manifest inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Suffix appended to an index path to form its build lock file.
pub const BUILD_LOCK_SUFFIX: &str = "lock";

/// Record log file name inside a content store directory.
pub const RECORD_LOG_FILE: &str = "records.log";

/// Offset index database file name inside a content store directory.
pub const RECORD_INDEX_FILE: &str = "records.db";

/// Separator used to join indexed field names into a cache field label.
pub const FIELD_LABEL_SEPARATOR: &str = "+";
