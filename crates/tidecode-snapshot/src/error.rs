//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Invalid engine configuration, detected at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A snapshot cannot fit in the store even after maximal eviction.
    #[error("snapshot cannot be admitted: {needed} bytes needed, {budget} bytes available after cleanup")]
    Capacity { needed: u64, budget: u64 },

    /// Snapshot not found.
    #[error("snapshot not found: {0}")]
    NotFound(String),

    /// A short snapshot reference matched more than one snapshot.
    #[error("ambiguous snapshot id: {id} matches {count} snapshots")]
    AmbiguousId { id: String, count: usize },

    /// Stored content no longer matches its captured checksum.
    #[error("checksum mismatch for {path} in snapshot {snapshot}")]
    Integrity { snapshot: String, path: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock was poisoned (another thread panicked while holding the lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Operation failed.
    #[error("snapshot operation failed: {0}")]
    OperationFailed(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
