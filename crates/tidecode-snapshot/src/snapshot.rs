//! Snapshot data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tidecode_util::Identifier;

/// Unique identifier for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// Create a new time-sortable snapshot ID (`snap_<ulid>`).
    pub fn new() -> Self {
        Self(Identifier::snapshot())
    }

    /// Create a snapshot ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the lowercase hex sha256 checksum of captured bytes.
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// What a snapshot holds for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileContent {
    /// Captured bytes plus their checksum.
    Captured { data: Vec<u8>, checksum: String },
    /// Recognized as binary and retained as a placeholder without bytes.
    ///
    /// A distinct variant, not empty content, so a legitimately empty file
    /// is never confused with an uncaptured binary.
    Binary,
}

/// One file's captured state within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Workspace-relative path, normalized (forward slashes, no `..`).
    pub path: String,

    /// Byte length of the file on disk at capture time.
    pub size: u64,

    /// POSIX permission bits at capture time, when available.
    pub mode: Option<u32>,

    /// Captured content or binary placeholder.
    pub content: FileContent,
}

impl FileEntry {
    /// Create an entry with captured bytes; the checksum is computed here.
    pub fn captured(path: impl Into<String>, data: Vec<u8>, mode: Option<u32>) -> Self {
        let size = data.len() as u64;
        let checksum = checksum(&data);
        Self {
            path: path.into(),
            size,
            mode,
            content: FileContent::Captured { data, checksum },
        }
    }

    /// Create a binary placeholder entry.
    pub fn binary(path: impl Into<String>, size: u64, mode: Option<u32>) -> Self {
        Self {
            path: path.into(),
            size,
            mode,
            content: FileContent::Binary,
        }
    }

    /// Whether this entry is a binary placeholder.
    pub fn is_binary(&self) -> bool {
        matches!(self.content, FileContent::Binary)
    }

    /// How many captured bytes this entry holds in memory.
    pub fn captured_len(&self) -> u64 {
        match &self.content {
            FileContent::Captured { data, .. } => data.len() as u64,
            FileContent::Binary => 0,
        }
    }

    /// Recompute the checksum over the held bytes and compare.
    ///
    /// Binary placeholders hold no bytes and are always intact.
    pub fn is_intact(&self) -> bool {
        match &self.content {
            FileContent::Captured { data, checksum: expected } => checksum(data) == *expected,
            FileContent::Binary => true,
        }
    }
}

/// Why a file was skipped during capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// What created a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Requested by the user.
    Manual,
    /// Safety net taken automatically before a restore.
    PreRestoreBackup,
}

/// A point-in-time capture of the workspace. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub id: SnapshotId,

    /// User-supplied description, non-empty.
    pub description: String,

    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,

    /// What created this snapshot.
    pub origin: SnapshotOrigin,

    /// Captured files, in scan order. Paths are unique within a snapshot.
    pub entries: Vec<FileEntry>,

    /// Files that could not be read during capture.
    pub skipped: Vec<SkippedFile>,

    /// Sum of captured byte lengths across entries.
    total_size: u64,
}

impl Snapshot {
    /// Create a new snapshot from captured entries.
    pub fn new(
        description: impl Into<String>,
        origin: SnapshotOrigin,
        entries: Vec<FileEntry>,
        skipped: Vec<SkippedFile>,
    ) -> Self {
        let total_size = entries.iter().map(FileEntry::captured_len).sum();
        Self {
            id: SnapshotId::new(),
            description: description.into(),
            created_at: Utc::now(),
            origin,
            entries,
            skipped,
            total_size,
        }
    }

    /// Total captured bytes held in memory by this snapshot.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of files in this snapshot.
    pub fn file_count(&self) -> usize {
        self.entries.len()
    }

    /// Look up an entry by its normalized path.
    pub fn entry(&self, path: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Verify every entry's checksum against its captured bytes.
    pub fn verify(&self) -> Result<(), crate::error::SnapshotError> {
        for entry in &self.entries {
            if !entry.is_intact() {
                return Err(crate::error::SnapshotError::Integrity {
                    snapshot: self.id.to_string(),
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Produce the listing summary for this snapshot.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            origin: self.origin,
            file_count: self.file_count(),
            total_size: self.total_size,
        }
    }
}

/// Lightweight snapshot metadata for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub file_count: usize,
    pub total_size: u64,
}
