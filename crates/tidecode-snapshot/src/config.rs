//! Engine configuration.
//!
//! The surrounding CLI is responsible for loading and merging configuration
//! sources; the engine receives one `EngineConfig` and fails fast in
//! `validate()` if any bound is out of range.

use crate::error::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};

/// Complete configuration for the snapshot engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Store capacity and eviction settings.
    pub storage: StorageConfig,

    /// Per-file capture settings.
    pub file_handling: FileHandlingConfig,

    /// Default restore behavior.
    pub restoration: RestorationConfig,

    /// File filtering patterns.
    pub filter: FilterConfig,
}

impl EngineConfig {
    /// Validate all bounds, failing before any snapshot operation runs.
    pub fn validate(&self) -> SnapshotResult<()> {
        self.storage.validate()?;
        self.file_handling.validate()?;
        Ok(())
    }
}

/// Store capacity and eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum number of snapshots held in memory.
    pub max_snapshots: usize,

    /// Maximum total captured bytes, in megabytes.
    pub max_memory_mb: u64,

    /// Which snapshots are evicted when over capacity.
    pub cleanup_strategy: CleanupStrategy,

    /// Fraction of capacity to evict down to when over a limit.
    ///
    /// Eviction continues until both snapshot count and captured bytes are
    /// at or below `cleanup_threshold * capacity`, leaving headroom so the
    /// next admission does not immediately evict again.
    pub cleanup_threshold: f64,
}

impl StorageConfig {
    /// The byte budget implied by `max_memory_mb`.
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb * 1_000_000
    }

    fn validate(&self) -> SnapshotResult<()> {
        if self.max_snapshots < 1 {
            return Err(SnapshotError::configuration("max_snapshots must be >= 1"));
        }
        if self.max_memory_mb < 1 {
            return Err(SnapshotError::configuration("max_memory_mb must be >= 1"));
        }
        if !self.cleanup_threshold.is_finite()
            || self.cleanup_threshold <= 0.0
            || self.cleanup_threshold > 1.0
        {
            return Err(SnapshotError::configuration(
                "cleanup_threshold must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_snapshots: 10,
            max_memory_mb: 100,
            cleanup_strategy: CleanupStrategy::OldestFirst,
            cleanup_threshold: 1.0,
        }
    }
}

/// Eviction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStrategy {
    OldestFirst,
}

/// Per-file capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileHandlingConfig {
    /// Files larger than this many bytes are excluded from capture.
    pub max_file_size: u64,

    /// Capture and restore POSIX permission bits.
    pub preserve_permissions: bool,

    /// What to do with files whose extension marks them as binary.
    pub binary_file_handling: BinaryFileHandling,

    /// Text encoding hint for the presentation layer.
    pub encoding: String,
}

impl FileHandlingConfig {
    fn validate(&self) -> SnapshotResult<()> {
        if self.max_file_size < 1024 {
            return Err(SnapshotError::configuration(
                "max_file_size must be >= 1024 bytes",
            ));
        }
        Ok(())
    }
}

impl Default for FileHandlingConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1_048_576,
            preserve_permissions: true,
            binary_file_handling: BinaryFileHandling::Exclude,
            encoding: "utf-8".to_string(),
        }
    }
}

/// Binary file policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryFileHandling {
    /// Leave binary files out of snapshots entirely.
    Exclude,
    /// Keep a placeholder entry without captured bytes.
    Include,
}

/// Default restore behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestorationConfig {
    /// Capture a safety snapshot before writing anything.
    pub create_backup_by_default: bool,

    /// Overwrite files that already exist at the destination.
    pub overwrite_existing_by_default: bool,

    /// Reapply captured permission bits.
    pub preserve_permissions_by_default: bool,

    /// Roll back already-written files when a write fails.
    pub rollback_on_failure_by_default: bool,

    /// Above this file count, callers should show a summary instead of a
    /// full file list. Presentation hint only; the engine ignores it.
    pub preview_threshold: usize,
}

impl Default for RestorationConfig {
    fn default() -> Self {
        Self {
            create_backup_by_default: true,
            overwrite_existing_by_default: true,
            preserve_permissions_by_default: true,
            rollback_on_failure_by_default: true,
            preview_threshold: 20,
        }
    }
}

/// File filtering patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Glob patterns excluded from every snapshot.
    pub default_exclusions: Vec<String>,

    /// If non-empty, only paths matching one of these globs are captured.
    pub default_inclusions: Vec<String>,

    /// Extensions (including the dot) treated as binary.
    pub binary_extensions: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            default_exclusions: vec![
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
                "**/target/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/.cache/**".to_string(),
                "**/.venv/**".to_string(),
            ],
            default_inclusions: Vec::new(),
            binary_extensions: vec![
                ".png", ".jpg", ".jpeg", ".gif", ".ico", ".pdf", ".zip", ".gz", ".tar", ".exe",
                ".dll", ".so", ".dylib", ".bin", ".woff", ".woff2",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_snapshots_rejected() {
        let mut config = EngineConfig::default();
        config.storage.max_snapshots = 0;
        assert!(matches!(
            config.validate(),
            Err(SnapshotError::Configuration(_))
        ));
    }

    #[test]
    fn zero_memory_rejected() {
        let mut config = EngineConfig::default();
        config.storage.max_memory_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_bounds_enforced() {
        let mut config = EngineConfig::default();
        config.storage.cleanup_threshold = 0.0;
        assert!(config.validate().is_err());

        config.storage.cleanup_threshold = 1.5;
        assert!(config.validate().is_err());

        config.storage.cleanup_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn small_max_file_size_rejected() {
        let mut config = EngineConfig::default();
        config.file_handling.max_file_size = 512;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_memory_bytes_uses_decimal_megabytes() {
        let storage = StorageConfig {
            max_memory_mb: 5,
            ..StorageConfig::default()
        };
        assert_eq!(storage.max_memory_bytes(), 5_000_000);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.storage.max_snapshots, config.storage.max_snapshots);
        assert_eq!(
            parsed.file_handling.binary_file_handling,
            BinaryFileHandling::Exclude
        );
    }
}
