//! In-memory, capacity-bounded snapshot storage.
//!
//! The store owns every snapshot after capture. Admission enforces both
//! bounds (snapshot count and captured bytes) on every `add`; when a bound
//! would be exceeded, the oldest snapshots are evicted until both projected
//! totals sit at or below `cleanup_threshold * capacity`. A snapshot that
//! cannot fit even with the store emptied is rejected whole - nothing is
//! ever stored partially.

use crate::config::StorageConfig;
use crate::error::{SnapshotError, SnapshotResult};
use crate::snapshot::{Snapshot, SnapshotId, SnapshotSummary};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{debug, info};

/// Live storage totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub snapshot_count: usize,
    pub max_snapshots: usize,
    pub memory_usage_mb: f64,
    pub max_memory_mb: u64,
    pub utilization_percent: f64,
}

/// Storage for snapshots.
///
/// Interior state sits behind an `RwLock`: reads (`get`, `list`, `stats`)
/// may run concurrently and always observe consistent totals; mutation is
/// additionally serialized by the `SnapshotManager` facade.
pub struct SnapshotStore {
    snapshots: RwLock<Vec<Snapshot>>,
    config: StorageConfig,
}

impl SnapshotStore {
    /// Create an empty store with the given capacity bounds.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            snapshots: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Admit a snapshot, evicting oldest-first if a bound would be exceeded.
    ///
    /// Eviction brings both projected totals down to
    /// `cleanup_threshold * capacity` so the next admission has headroom.
    /// Returns `Capacity` and leaves the store unchanged when the snapshot
    /// cannot fit even after evicting everything else.
    pub fn add(&self, snapshot: Snapshot) -> SnapshotResult<()> {
        let budget = self.config.max_memory_bytes();
        let new_bytes = snapshot.total_size();

        if new_bytes > budget {
            return Err(SnapshotError::Capacity {
                needed: new_bytes,
                budget,
            });
        }

        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        let current_bytes: u64 = snapshots.iter().map(Snapshot::total_size).sum();
        let over_count = snapshots.len() + 1 > self.config.max_snapshots;
        let over_bytes = current_bytes + new_bytes > budget;

        if over_count || over_bytes {
            let count_target =
                (self.config.max_snapshots as f64 * self.config.cleanup_threshold).floor() as usize;
            let byte_target = (budget as f64 * self.config.cleanup_threshold).floor() as u64;

            // The newcomer alone must satisfy the post-cleanup targets;
            // otherwise the threshold would demand evicting it too.
            if count_target < 1 || new_bytes > byte_target {
                return Err(SnapshotError::Capacity {
                    needed: new_bytes,
                    budget: byte_target,
                });
            }

            let mut bytes = current_bytes;
            while !snapshots.is_empty()
                && (snapshots.len() + 1 > count_target || bytes + new_bytes > byte_target)
            {
                let victim = Self::oldest_index(&snapshots);
                let evicted = snapshots.remove(victim);
                bytes -= evicted.total_size();
                info!(
                    id = %evicted.id,
                    description = %evicted.description,
                    "Evicted snapshot to reclaim capacity"
                );
            }
        }

        debug!(id = %snapshot.id, bytes = new_bytes, "Admitted snapshot");
        snapshots.push(snapshot);
        Ok(())
    }

    /// Get a snapshot by exact ID.
    ///
    /// Every entry checksum is verified before the snapshot is handed out;
    /// a mismatch surfaces as `Integrity`, never silently.
    pub fn get(&self, id: &str) -> SnapshotResult<Option<Snapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        match snapshots.iter().find(|s| s.id.as_str() == id) {
            Some(snapshot) => {
                snapshot.verify()?;
                Ok(Some(snapshot.clone()))
            }
            None => Ok(None),
        }
    }

    /// Resolve an exact ID or an unambiguous prefix to a full snapshot ID.
    pub fn resolve_id(&self, reference: &str) -> SnapshotResult<SnapshotId> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        if let Some(exact) = snapshots.iter().find(|s| s.id.as_str() == reference) {
            return Ok(exact.id.clone());
        }

        let matches: Vec<&Snapshot> = snapshots
            .iter()
            .filter(|s| s.id.as_str().starts_with(reference))
            .collect();

        match matches.len() {
            0 => Err(SnapshotError::not_found(reference)),
            1 => Ok(matches[0].id.clone()),
            count => Err(SnapshotError::AmbiguousId {
                id: reference.to_string(),
                count,
            }),
        }
    }

    /// List snapshot summaries, newest first.
    pub fn list(&self, limit: Option<usize>) -> SnapshotResult<Vec<SnapshotSummary>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        // Newest first; creation-time ties resolved by insertion order.
        let mut indexed: Vec<(usize, &Snapshot)> = snapshots.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| ib.cmp(ia))
        });

        let mut summaries: Vec<SnapshotSummary> =
            indexed.into_iter().map(|(_, s)| s.summary()).collect();
        if let Some(limit) = limit {
            summaries.truncate(limit);
        }
        Ok(summaries)
    }

    /// Remove a snapshot by exact ID. Returns `false` if absent.
    pub fn remove(&self, id: &str) -> SnapshotResult<bool> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        let before = snapshots.len();
        snapshots.retain(|s| s.id.as_str() != id);
        let removed = snapshots.len() < before;
        if removed {
            info!(id, "Deleted snapshot");
        }
        Ok(removed)
    }

    /// Current storage totals, computed from live state.
    pub fn stats(&self) -> SnapshotResult<StorageStats> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|e| SnapshotError::LockPoisoned(e.to_string()))?;

        let bytes: u64 = snapshots.iter().map(Snapshot::total_size).sum();
        let budget = self.config.max_memory_bytes();

        let count_utilization = snapshots.len() as f64 / self.config.max_snapshots as f64;
        let byte_utilization = bytes as f64 / budget as f64;

        Ok(StorageStats {
            snapshot_count: snapshots.len(),
            max_snapshots: self.config.max_snapshots,
            memory_usage_mb: bytes as f64 / 1_000_000.0,
            max_memory_mb: self.config.max_memory_mb,
            utilization_percent: count_utilization.max(byte_utilization) * 100.0,
        })
    }

    /// Index of the eviction victim: earliest creation time, ties broken by
    /// insertion order (FIFO).
    fn oldest_index(snapshots: &[Snapshot]) -> usize {
        let mut oldest = 0;
        for (index, snapshot) in snapshots.iter().enumerate().skip(1) {
            if snapshot.created_at < snapshots[oldest].created_at {
                oldest = index;
            }
        }
        oldest
    }
}
