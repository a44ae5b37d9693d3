//! Workspace capture and restore.
//!
//! `FileBackup` walks the workspace into a `Snapshot` and writes a
//! `Snapshot` back onto the workspace. Restore is not atomic at the
//! filesystem level; when `rollback_on_failure` is set, a safety snapshot
//! taken through the ordinary store API is used to rewind every file the
//! failed restore already touched.

use crate::config::{FileHandlingConfig, RestorationConfig};
use crate::error::SnapshotResult;
use crate::filter::{FileFilter, FilterDecision};
use crate::snapshot::{FileContent, FileEntry, SkippedFile, Snapshot, SnapshotId, SnapshotOrigin};
use crate::store::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tidecode_util::path as pathutil;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Options for a single restore operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Capture the current workspace into a safety snapshot first.
    pub create_backup: bool,
    /// Overwrite files that already exist at the destination.
    pub overwrite_existing: bool,
    /// Reapply captured permission bits after writing.
    pub preserve_permissions: bool,
    /// Rewind already-written files from the safety snapshot on failure.
    pub rollback_on_failure: bool,
}

impl RestoreOptions {
    /// Build options from the configured restoration defaults.
    pub fn from_config(config: &RestorationConfig) -> Self {
        Self {
            create_backup: config.create_backup_by_default,
            overwrite_existing: config.overwrite_existing_by_default,
            preserve_permissions: config.preserve_permissions_by_default,
            rollback_on_failure: config.rollback_on_failure_by_default,
        }
    }
}

/// One file that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of a restore operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    /// Snapshot that was restored.
    pub snapshot_id: SnapshotId,
    /// Safety snapshot taken before writing, if one was requested.
    pub backup_id: Option<SnapshotId>,
    pub files_restored: usize,
    pub files_skipped: usize,
    /// Write failures, including any best-effort rollback failures.
    pub failures: Vec<RestoreFailure>,
    /// Whether already-written files were rewound from the safety snapshot.
    pub rolled_back: bool,
}

impl RestoreResult {
    /// True when every entry restored or skipped cleanly.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads the workspace into snapshots and writes snapshots back.
pub struct FileBackup {
    root: PathBuf,
    filter: FileFilter,
    file_handling: FileHandlingConfig,
}

impl FileBackup {
    /// Create a backup orchestrator rooted at the workspace directory.
    pub fn new(root: impl Into<PathBuf>, filter: FileFilter, file_handling: FileHandlingConfig) -> Self {
        Self {
            root: root.into(),
            filter,
            file_handling,
        }
    }

    /// The workspace root this orchestrator reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Capture the workspace into a new snapshot.
    ///
    /// The walk is depth-first with entries sorted by file name, so the
    /// same workspace state always produces the same entry order. A file
    /// that cannot be read is recorded as skipped with its error and the
    /// capture continues.
    pub async fn capture(
        &self,
        description: &str,
        origin: SnapshotOrigin,
    ) -> SnapshotResult<Snapshot> {
        let mut entries: Vec<FileEntry> = Vec::new();
        let mut skipped: Vec<SkippedFile> = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for dir_entry in walker {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    warn!(path = %path, error = %e, "Skipping unreadable directory entry");
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !dir_entry.file_type().is_file() {
                continue;
            }

            let Some(relative) = pathutil::relative_to(dir_entry.path(), &self.root) else {
                continue;
            };
            let Some(key) = pathutil::entry_key(&relative) else {
                continue;
            };

            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    skipped.push(SkippedFile {
                        path: key,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let size = metadata.len();
            let mode = if self.file_handling.preserve_permissions {
                file_mode(&metadata)
            } else {
                None
            };

            match self.filter.decide(&key, size) {
                FilterDecision::Exclude(reason) => {
                    debug!(path = %key, reason = reason.as_str(), "Excluded from snapshot");
                }
                FilterDecision::IncludeAsBinary => {
                    entries.push(FileEntry::binary(key, size, mode));
                }
                FilterDecision::Include => match fs::read(dir_entry.path()).await {
                    Ok(data) => {
                        entries.push(FileEntry::captured(key, data, mode));
                    }
                    Err(e) => {
                        warn!(path = %key, error = %e, "Failed to read file during capture");
                        skipped.push(SkippedFile {
                            path: key,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        // An empty workspace captures fine; a workspace where every file
        // failed to read does not.
        if entries.is_empty() && !skipped.is_empty() {
            return Err(crate::error::SnapshotError::operation_failed(format!(
                "no files could be captured ({} skipped)",
                skipped.len()
            )));
        }

        let snapshot = Snapshot::new(description, origin, entries, skipped);
        info!(
            id = %snapshot.id,
            files = snapshot.file_count(),
            bytes = snapshot.total_size(),
            skipped = snapshot.skipped.len(),
            "Captured snapshot"
        );
        Ok(snapshot)
    }

    /// Write a snapshot's contents back onto the workspace.
    ///
    /// With `create_backup`, the current workspace state is first captured
    /// and admitted to `store` as an ordinary snapshot - the safety net is
    /// listable and subject to the same capacity bounds as any other. A
    /// capacity rejection of the safety snapshot aborts the restore before
    /// any file is touched.
    pub async fn restore(
        &self,
        snapshot: &Snapshot,
        options: &RestoreOptions,
        store: &SnapshotStore,
    ) -> SnapshotResult<RestoreResult> {
        let backup_id = if options.create_backup {
            let backup = self
                .capture(
                    &format!("Backup before restoring {}", snapshot.id),
                    SnapshotOrigin::PreRestoreBackup,
                )
                .await?;
            let id = backup.id.clone();
            store.add(backup)?;
            debug!(backup_id = %id, "Safety snapshot stored");
            Some(id)
        } else {
            None
        };

        let mut result = RestoreResult {
            snapshot_id: snapshot.id.clone(),
            backup_id: backup_id.clone(),
            files_restored: 0,
            files_skipped: 0,
            failures: Vec::new(),
            rolled_back: false,
        };
        let mut written: Vec<String> = Vec::new();

        for entry in &snapshot.entries {
            let FileContent::Captured { data, checksum } = &entry.content else {
                // Binary placeholders carry no bytes to write.
                result.files_skipped += 1;
                continue;
            };

            let Some(destination) = pathutil::safe_join(&self.root, &entry.path) else {
                result.failures.push(RestoreFailure {
                    path: entry.path.clone(),
                    error: "path escapes the workspace root".to_string(),
                });
                if options.rollback_on_failure {
                    break;
                }
                continue;
            };

            let exists = destination.exists();
            if exists && !options.overwrite_existing {
                result.files_skipped += 1;
                continue;
            }

            // Unchanged bytes need no rewrite.
            if exists {
                if let Ok(current) = fs::read(&destination).await {
                    if crate::snapshot::checksum(&current) == *checksum {
                        result.files_skipped += 1;
                        continue;
                    }
                }
            }

            match self
                .write_entry(&destination, data, entry.mode, options.preserve_permissions)
                .await
            {
                Ok(()) => {
                    debug!(path = %entry.path, "Restored file");
                    written.push(entry.path.clone());
                    result.files_restored += 1;
                }
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "Failed to restore file");
                    result.failures.push(RestoreFailure {
                        path: entry.path.clone(),
                        error: e.to_string(),
                    });
                    if options.rollback_on_failure {
                        break;
                    }
                }
            }
        }

        if !result.failures.is_empty() && options.rollback_on_failure {
            self.rollback(&written, backup_id.as_ref(), store, &mut result)
                .await;
            result.rolled_back = true;
        }

        info!(
            snapshot_id = %snapshot.id,
            restored = result.files_restored,
            skipped = result.files_skipped,
            failures = result.failures.len(),
            rolled_back = result.rolled_back,
            "Restore finished"
        );
        Ok(result)
    }

    /// Rewind already-written files from the safety snapshot, best-effort.
    ///
    /// Rollback failures are appended to the result's failure list; they
    /// never replace the original error.
    async fn rollback(
        &self,
        written: &[String],
        backup_id: Option<&SnapshotId>,
        store: &SnapshotStore,
        result: &mut RestoreResult,
    ) {
        let Some(backup_id) = backup_id else {
            warn!("Rollback requested but no safety snapshot was taken");
            result.failures.push(RestoreFailure {
                path: String::new(),
                error: "rollback skipped: no safety snapshot was taken".to_string(),
            });
            return;
        };

        let backup = match store.get(backup_id.as_str()) {
            Ok(Some(backup)) => backup,
            Ok(None) => {
                warn!(backup_id = %backup_id, "Safety snapshot missing during rollback");
                result.failures.push(RestoreFailure {
                    path: String::new(),
                    error: format!("rollback skipped: safety snapshot {backup_id} not found"),
                });
                return;
            }
            Err(e) => {
                warn!(backup_id = %backup_id, error = %e, "Failed to load safety snapshot");
                result.failures.push(RestoreFailure {
                    path: String::new(),
                    error: format!("rollback skipped: {e}"),
                });
                return;
            }
        };

        warn!(
            backup_id = %backup_id,
            files = written.len(),
            "Rolling back partially restored files"
        );

        for path in written.iter().rev() {
            let Some(destination) = pathutil::safe_join(&self.root, path) else {
                continue;
            };

            let outcome = match backup.entry(path) {
                Some(FileEntry {
                    content: FileContent::Captured { data, .. },
                    mode,
                    ..
                }) => {
                    self.write_entry(&destination, data, *mode, true).await
                }
                // No pre-image: the restore created this file, remove it.
                _ => fs::remove_file(&destination).await,
            };

            if let Err(e) = outcome {
                warn!(path = %path, error = %e, "Rollback failed for file");
                result.failures.push(RestoreFailure {
                    path: path.clone(),
                    error: format!("rollback failed: {e}"),
                });
            } else {
                result.files_restored = result.files_restored.saturating_sub(1);
            }
        }
    }

    async fn write_entry(
        &self,
        destination: &Path,
        data: &[u8],
        mode: Option<u32>,
        preserve_permissions: bool,
    ) -> std::io::Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(destination, data).await?;

        if preserve_permissions {
            if let Some(mode) = mode {
                apply_mode(destination, mode).await?;
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
async fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn apply_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
