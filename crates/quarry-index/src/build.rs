//! Atomic index builds and validated loads.
//!
//! A build takes `<target>.lock`, writes into a fresh hidden staging
//! directory next to the target, writes the manifest last and only then
//! renames the staging directory over the target. A crash at any point
//! before the rename leaves the previous index (or nothing) in place.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quarry_core::constants::{BUILD_LOCK_SUFFIX, INDEX_FORMAT_VERSION};
use quarry_core::errors::{QuarryError, QuarryResult};
use quarry_core::models::Fingerprint;

use crate::backend::{BuildContext, IndexBackend, IndexBuilder, IndexHandle, IndexItem};
use crate::manifest::{checksum_all, IndexManifest};
use crate::{corrupt, io_err};

/// Exclusive per-target build lock. Released on drop.
#[derive(Debug)]
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(target: &Path, build_id: Uuid) -> QuarryResult<Self> {
        let path = lock_path(target);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(QuarryError::BuildInProgress {
                    path: target.display().to_string(),
                })
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        writeln!(file, "pid={} build={build_id}", std::process::id()).map_err(|e| io_err(&path, e))?;
        Ok(Self { path })
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release build lock");
        }
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BUILD_LOCK_SUFFIX);
    target.with_file_name(name)
}

fn target_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string())
}

fn staging_prefix(target: &Path) -> String {
    format!(".{}.staging-", target_name(target))
}

/// One-shot build of one index directory.
pub struct BuildSession {
    backend: Arc<dyn IndexBackend>,
    ctx: BuildContext,
    target: PathBuf,
    staging: PathBuf,
    build_id: Uuid,
    builder: Option<Box<dyn IndexBuilder>>,
    record_count: u64,
    committed: bool,
    // Dropped after the staging cleanup in `Drop`.
    _lock: BuildLock,
}

impl BuildSession {
    /// Lock `target` and start a build in a fresh staging directory.
    ///
    /// Returns `BuildInProgress` if another session holds the lock.
    pub fn begin(backend: Arc<dyn IndexBackend>, target: &Path, ctx: BuildContext) -> QuarryResult<Self> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| io_err(&parent, e))?;

        let build_id = Uuid::new_v4();
        let lock = BuildLock::acquire(target, build_id)?;
        remove_abandoned_staging(&parent, target);

        let staging = parent.join(format!("{}{build_id}", staging_prefix(target)));
        fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
        let builder = backend.begin(&staging, &ctx)?;

        info!(
            target = %target.display(),
            variant = %backend.variant(),
            %build_id,
            "index build started"
        );
        Ok(Self {
            backend,
            ctx,
            target: target.to_path_buf(),
            staging,
            build_id,
            builder: Some(builder),
            record_count: 0,
            committed: false,
            _lock: lock,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn add_batch(&mut self, items: &[IndexItem]) -> QuarryResult<()> {
        let builder = self.builder.as_mut().ok_or_else(|| QuarryError::InvalidArgument {
            reason: "build session already finished".to_string(),
        })?;
        builder.add_batch(items)?;
        self.record_count += items.len() as u64;
        debug!(items = items.len(), total = self.record_count, "index batch added");
        Ok(())
    }

    /// Finish native files, write the manifest, swap the staging directory
    /// into place and open the result.
    pub fn commit(mut self) -> QuarryResult<Arc<dyn IndexHandle>> {
        let builder = self.builder.take().ok_or_else(|| QuarryError::InvalidArgument {
            reason: "build session already finished".to_string(),
        })?;
        let files = builder.finish()?;
        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            variant: self.backend.variant(),
            build_id: self.build_id,
            encoder: if self.backend.variant().needs_encoder() {
                self.ctx.encoder.clone()
            } else {
                None
            },
            tokenizer: if self.backend.variant().needs_tokenizer() {
                self.ctx.tokenizer_fingerprint()
            } else {
                None
            },
            fields: self.ctx.fields.clone(),
            record_count: self.record_count,
            built_at: Utc::now(),
            files: checksum_all(&self.staging, &files)?,
        };
        manifest.write(&self.staging)?;
        self.swap_into_place()?;
        self.committed = true;

        info!(
            target = %self.target.display(),
            variant = %manifest.variant,
            records = manifest.record_count,
            files = manifest.files.len(),
            build_id = %self.build_id,
            "index build committed"
        );
        self.backend.open(&self.target, &manifest, &self.ctx)
    }

    fn swap_into_place(&self) -> QuarryResult<()> {
        let displaced = if self.target.exists() {
            let old = self.target.with_file_name(format!(
                ".{}.old-{}",
                target_name(&self.target),
                self.build_id
            ));
            fs::rename(&self.target, &old).map_err(|e| io_err(&self.target, e))?;
            Some(old)
        } else {
            None
        };
        fs::rename(&self.staging, &self.target).map_err(|e| io_err(&self.target, e))?;
        if let Some(old) = displaced {
            if let Err(e) = fs::remove_dir_all(&old) {
                warn!(path = %old.display(), error = %e, "failed to remove replaced index");
            }
        }
        Ok(())
    }
}

impl Drop for BuildSession {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Drop the builder first so its file handles are closed.
        self.builder.take();
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.staging.display(), error = %e, "failed to remove staging directory");
            }
        }
        debug!(target = %self.target.display(), build_id = %self.build_id, "index build abandoned");
    }
}

/// Staging directories left by crashed builds of the same target. Only
/// called while holding the target's lock.
fn remove_abandoned_staging(parent: &Path, target: &Path) {
    let prefix = staging_prefix(target);
    let Ok(entries) = fs::read_dir(parent) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => info!(path = %path.display(), "removed abandoned staging directory"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove abandoned staging"),
            }
        }
    }
}

/// Open a committed index after validating it against `ctx`.
pub fn load_index(
    backend: &dyn IndexBackend,
    path: &Path,
    ctx: &BuildContext,
) -> QuarryResult<Arc<dyn IndexHandle>> {
    if !path.is_dir() {
        return Err(QuarryError::not_found(format!("index directory {}", path.display())));
    }
    let manifest = IndexManifest::read(path)?;

    if manifest.variant != backend.variant() {
        return Err(corrupt(
            path,
            format!(
                "manifest variant {} does not match configured {}",
                manifest.variant,
                backend.variant()
            ),
        ));
    }
    let variant = backend.variant();
    if variant.needs_encoder() {
        check_fingerprint(manifest.encoder.as_ref(), ctx.encoder.as_ref())?;
    }
    if variant.needs_tokenizer() {
        check_fingerprint(manifest.tokenizer.as_ref(), ctx.tokenizer_fingerprint().as_ref())?;
    }
    manifest.verify_files(path, ctx.verify_checksums)?;

    let handle = backend.open(path, &manifest, ctx)?;
    info!(
        path = %path.display(),
        variant = %variant,
        records = manifest.record_count,
        built_at = %manifest.built_at,
        "index loaded"
    );
    Ok(handle)
}

fn check_fingerprint(
    stored: Option<&Fingerprint>,
    current: Option<&Fingerprint>,
) -> QuarryResult<()> {
    if stored == current {
        return Ok(());
    }
    let show = |fp: Option<&Fingerprint>| {
        fp.map(|f| f.to_string()).unwrap_or_else(|| "none".to_string())
    };
    Err(QuarryError::FingerprintMismatch {
        stored: show(stored),
        current: show(current),
    })
}
