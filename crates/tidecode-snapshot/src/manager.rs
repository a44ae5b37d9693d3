//! Snapshot engine facade.
//!
//! `SnapshotManager` validates requests, coordinates `FileBackup` and
//! `SnapshotStore`, and serializes mutating operations. A cooperative
//! runtime does not grant mutual exclusion for free, so the serialization
//! point is explicit: one `tokio::sync::Mutex` that every mutating
//! operation must hold. Read-only operations go straight to the store and
//! rely on its read lock for consistent totals.

use crate::backup::{FileBackup, RestoreOptions, RestoreResult};
use crate::config::EngineConfig;
use crate::error::{SnapshotError, SnapshotResult};
use crate::filter::FileFilter;
use crate::snapshot::{SnapshotId, SnapshotOrigin, SnapshotSummary};
use crate::store::{SnapshotStore, StorageStats};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// The public surface of the snapshot engine.
pub struct SnapshotManager {
    store: Arc<SnapshotStore>,
    backup: FileBackup,
    config: EngineConfig,
    write_lock: Mutex<()>,
}

impl SnapshotManager {
    /// Create a snapshot engine for the workspace rooted at `root`.
    ///
    /// Configuration is validated here; nothing runs against an invalid
    /// config.
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> SnapshotResult<Self> {
        config.validate()?;

        let filter = FileFilter::new(&config.filter, &config.file_handling)?;
        let backup = FileBackup::new(root, filter, config.file_handling.clone());
        let store = Arc::new(SnapshotStore::new(config.storage.clone()));

        Ok(Self {
            store,
            backup,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Capture the workspace into a new snapshot and admit it to the store.
    ///
    /// Rejects empty or whitespace-only descriptions. A `Capacity`
    /// rejection from the store is surfaced verbatim.
    pub async fn create_snapshot(&self, description: &str) -> SnapshotResult<SnapshotSummary> {
        let description = description.trim();
        if description.is_empty() {
            return Err(SnapshotError::operation_failed(
                "snapshot description must not be empty",
            ));
        }

        let _guard = self.write_lock.lock().await;

        let snapshot = self.backup.capture(description, SnapshotOrigin::Manual).await?;
        let summary = snapshot.summary();
        self.store.add(snapshot)?;

        info!(id = %summary.id, description, "Created snapshot");
        Ok(summary)
    }

    /// List snapshot summaries, newest first. Non-mutating; does not queue
    /// behind in-flight mutations.
    pub fn list_snapshots(&self, limit: Option<usize>) -> SnapshotResult<Vec<SnapshotSummary>> {
        self.store.list(limit)
    }

    /// Restore a snapshot onto the workspace.
    ///
    /// `reference` may be a full snapshot ID or an unambiguous prefix.
    /// When `options` is `None`, the configured restoration defaults apply.
    pub async fn restore_snapshot(
        &self,
        reference: &str,
        options: Option<RestoreOptions>,
    ) -> SnapshotResult<RestoreResult> {
        let _guard = self.write_lock.lock().await;

        let id = self.store.resolve_id(reference)?;
        let snapshot = self
            .store
            .get(id.as_str())?
            .ok_or_else(|| SnapshotError::not_found(reference))?;

        let options =
            options.unwrap_or_else(|| RestoreOptions::from_config(&self.config.restoration));

        info!(id = %id, "Restoring snapshot");
        self.backup.restore(&snapshot, &options, &self.store).await
    }

    /// Delete a snapshot by exact ID. Returns `false` if absent.
    pub async fn delete_snapshot(&self, id: &str) -> SnapshotResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(id)
    }

    /// Resolve a full ID or unambiguous prefix to a snapshot ID.
    pub fn resolve_id(&self, reference: &str) -> SnapshotResult<SnapshotId> {
        self.store.resolve_id(reference)
    }

    /// Current storage totals.
    pub fn storage_stats(&self) -> SnapshotResult<StorageStats> {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use tempfile::TempDir;
    use tokio::fs;

    async fn manager_in(dir: &TempDir) -> SnapshotManager {
        SnapshotManager::new(dir.path(), EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn create_rejects_blank_descriptions() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir).await;

        assert!(manager.create_snapshot("").await.is_err());
        assert!(manager.create_snapshot("   \t\n").await.is_err());
        assert_eq!(manager.storage_stats().unwrap().snapshot_count, 0);
    }

    #[tokio::test]
    async fn create_list_delete_cycle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.txt"), "content").await.unwrap();
        let manager = manager_in(&dir).await;

        let summary = manager.create_snapshot("  before edit  ").await.unwrap();
        assert_eq!(summary.description, "before edit");
        assert_eq!(summary.file_count, 1);

        let listed = manager.list_snapshots(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, summary.id);

        assert!(manager.delete_snapshot(summary.id.as_str()).await.unwrap());
        assert!(!manager.delete_snapshot(summary.id.as_str()).await.unwrap());
        assert!(manager.list_snapshots(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_operation() {
        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.storage.max_snapshots = 0;

        assert!(matches!(
            SnapshotManager::new(dir.path(), config),
            Err(SnapshotError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn restore_by_unambiguous_prefix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.txt"), "v1").await.unwrap();
        let manager = manager_in(&dir).await;

        let summary = manager.create_snapshot("v1").await.unwrap();
        fs::write(dir.path().join("file.txt"), "v2").await.unwrap();

        // A ULID's first half is its timestamp; use a long prefix.
        let prefix = &summary.id.as_str()[..summary.id.as_str().len() - 4];
        let result = manager.restore_snapshot(prefix, None).await.unwrap();
        assert!(result.succeeded());
        assert_eq!(
            fs::read_to_string(dir.path().join("file.txt")).await.unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn restore_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir).await;

        let result = manager.restore_snapshot("snap_nope", None).await;
        assert!(matches!(result, Err(SnapshotError::NotFound(_))));
    }

    #[tokio::test]
    async fn restore_takes_listable_safety_snapshot() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.txt"), "original").await.unwrap();
        let manager = manager_in(&dir).await;

        let summary = manager.create_snapshot("original").await.unwrap();
        fs::write(dir.path().join("file.txt"), "edited").await.unwrap();

        let result = manager
            .restore_snapshot(summary.id.as_str(), None)
            .await
            .unwrap();
        assert!(result.succeeded());

        let listed = manager.list_snapshots(None).unwrap();
        assert_eq!(listed.len(), 2);
        // Newest first: the safety snapshot precedes the manual one.
        assert_eq!(listed[0].id, result.backup_id.unwrap());
        assert_eq!(
            listed[0].origin,
            crate::snapshot::SnapshotOrigin::PreRestoreBackup
        );
    }

    #[tokio::test]
    async fn capacity_error_surfaces_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), vec![b'x'; 4096])
            .await
            .unwrap();

        let mut config = EngineConfig::default();
        // One slot with a sub-slot cleanup target: the second admission
        // cannot satisfy the threshold and must be rejected.
        config.storage.max_snapshots = 1;
        config.storage.cleanup_threshold = 0.5;
        let manager = SnapshotManager::new(dir.path(), config).unwrap();

        manager.create_snapshot("first").await.unwrap();
        let result = manager.create_snapshot("second").await;
        assert!(matches!(result, Err(SnapshotError::Capacity { .. })));

        // The store still holds the first snapshot.
        assert_eq!(manager.storage_stats().unwrap().snapshot_count, 1);
    }

    #[tokio::test]
    async fn mutating_operations_serialize() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}.txt")), format!("body {i}"))
                .await
                .unwrap();
        }
        let manager = StdArc::new(manager_in(&dir).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = StdArc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.create_snapshot(&format!("concurrent {i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stats = manager.storage_stats().unwrap();
        assert!(stats.snapshot_count <= stats.max_snapshots);
        assert_eq!(stats.snapshot_count, 8);
    }

    #[tokio::test]
    async fn stats_track_live_totals() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file.txt"), "12345").await.unwrap();
        let manager = manager_in(&dir).await;

        let before = manager.storage_stats().unwrap();
        assert_eq!(before.snapshot_count, 0);
        assert_eq!(before.utilization_percent, 0.0);

        let summary = manager.create_snapshot("one").await.unwrap();
        let after = manager.storage_stats().unwrap();
        assert_eq!(after.snapshot_count, 1);
        assert!(after.memory_usage_mb > 0.0);

        manager.delete_snapshot(summary.id.as_str()).await.unwrap();
        let cleared = manager.storage_stats().unwrap();
        assert_eq!(cleared.snapshot_count, 0);
        assert_eq!(cleared.memory_usage_mb, 0.0);
    }
}
