//! Workspace snapshot engine for tidecode.
//!
//! This crate provides bounded, in-memory workspace captures that enable:
//! - Point-in-time snapshots of the working tree
//! - Restore with an automatic safety backup and rollback on failure
//! - Capacity-bounded storage with oldest-first eviction
//! - Checksum verification of every captured file on read-back
//!
//! # Example
//!
//! ```no_run
//! use tidecode_snapshot::{EngineConfig, SnapshotManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SnapshotManager::new("/project/root", EngineConfig::default())?;
//!
//! // Take a snapshot before a risky edit
//! let summary = manager.create_snapshot("Before refactor").await?;
//!
//! // ... edit files ...
//!
//! // Restore if needed (full id or unambiguous prefix)
//! let result = manager.restore_snapshot(summary.id.as_str(), None).await?;
//! assert!(result.succeeded());
//! # Ok(())
//! # }
//! ```

mod backup;
mod config;
mod error;
mod filter;
mod manager;
mod snapshot;
mod store;

pub use backup::{FileBackup, RestoreFailure, RestoreOptions, RestoreResult};
pub use config::{
    BinaryFileHandling, CleanupStrategy, EngineConfig, FileHandlingConfig, FilterConfig,
    RestorationConfig, StorageConfig,
};
pub use error::{SnapshotError, SnapshotResult};
pub use filter::{ExcludeReason, FileFilter, FilterDecision};
pub use manager::SnapshotManager;
pub use snapshot::{
    FileContent, FileEntry, SkippedFile, Snapshot, SnapshotId, SnapshotOrigin, SnapshotSummary,
};
pub use store::{SnapshotStore, StorageStats};
