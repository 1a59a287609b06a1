//! `manifest.json`: the last file a build writes and the first a load reads.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quarry_core::config::BackendVariant;
use quarry_core::constants::{INDEX_FORMAT_VERSION, MANIFEST_FILE};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::Fingerprint;

use crate::{corrupt, io_err};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    /// Path relative to the index directory, `/`-separated.
    pub path: String,
    pub bytes: u64,
    /// blake3 hex digest of the file contents.
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub variant: BackendVariant,
    pub build_id: Uuid,
    pub encoder: Option<Fingerprint>,
    pub tokenizer: Option<Fingerprint>,
    pub fields: Vec<String>,
    pub record_count: u64,
    pub built_at: DateTime<Utc>,
    pub files: Vec<FileChecksum>,
}

impl IndexManifest {
    /// Read and parse `manifest.json` from `dir`.
    ///
    /// A missing directory or manifest is `NotFound`; anything unreadable
    /// after that is `CorruptIndex`.
    pub fn read(dir: &Path) -> QuarryResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(QuarryError::not_found(format!(
                    "index manifest {}",
                    path.display()
                )))
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        let manifest: IndexManifest = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(dir, format!("unparsable manifest: {e}")))?;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(corrupt(
                dir,
                format!(
                    "format version {} (expected {INDEX_FORMAT_VERSION})",
                    manifest.format_version
                ),
            ));
        }
        Ok(manifest)
    }

    /// Write `manifest.json` into `dir` through a synced temp file.
    pub fn write(&self, dir: &Path) -> QuarryResult<()> {
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        let mut file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(&json).map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))
    }

    /// Check every listed file exists with the recorded size and, when
    /// `verify_contents` is set, the recorded digest.
    pub fn verify_files(&self, dir: &Path, verify_contents: bool) -> QuarryResult<()> {
        for entry in &self.files {
            let path = dir.join(&entry.path);
            let meta = fs::metadata(&path)
                .map_err(|_| corrupt(dir, format!("missing index file {}", entry.path)))?;
            if meta.len() != entry.bytes {
                return Err(corrupt(
                    dir,
                    format!(
                        "{} is {} bytes, manifest records {}",
                        entry.path,
                        meta.len(),
                        entry.bytes
                    ),
                ));
            }
            if verify_contents {
                let digest = checksum_file(&path)?;
                if digest != entry.blake3 {
                    return Err(corrupt(dir, format!("checksum mismatch for {}", entry.path)));
                }
            }
        }
        Ok(())
    }
}

/// blake3 digest of a file, streamed.
pub fn checksum_file(path: &Path) -> QuarryResult<String> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| io_err(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Checksum entries for `files` under `dir`.
pub fn checksum_all(dir: &Path, files: &[String]) -> QuarryResult<Vec<FileChecksum>> {
    files
        .iter()
        .map(|rel| {
            let path = dir.join(rel);
            let bytes = fs::metadata(&path).map_err(|e| io_err(&path, e))?.len();
            Ok(FileChecksum {
                path: rel.clone(),
                bytes,
                blake3: checksum_file(&path)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(files: Vec<FileChecksum>) -> IndexManifest {
        IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            variant: BackendVariant::Sparse,
            build_id: Uuid::new_v4(),
            encoder: None,
            tokenizer: Some(Fingerprint::new("simple", "1", 0)),
            fields: vec!["text".to_string()],
            record_count: 3,
            built_at: Utc::now(),
            files,
        }
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let m = manifest(Vec::new());
        m.write(dir.path()).unwrap();
        assert_eq!(IndexManifest::read(dir.path()).unwrap(), m);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[test]
    fn missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            IndexManifest::read(dir.path()),
            Err(QuarryError::NotFound { .. })
        ));
    }

    #[test]
    fn garbage_manifest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), b"{not json").unwrap();
        assert!(matches!(
            IndexManifest::read(dir.path()),
            Err(QuarryError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn verify_detects_changed_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("postings.json"), b"abc").unwrap();
        let files = checksum_all(dir.path(), &["postings.json".to_string()]).unwrap();
        let m = manifest(files);
        m.verify_files(dir.path(), true).unwrap();

        fs::write(dir.path().join("postings.json"), b"abd").unwrap();
        assert!(m.verify_files(dir.path(), false).is_ok());
        assert!(matches!(
            m.verify_files(dir.path(), true),
            Err(QuarryError::CorruptIndex { .. })
        ));
    }
}
