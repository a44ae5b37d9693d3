//! File filtering for snapshot capture.

use crate::config::{BinaryFileHandling, FileHandlingConfig, FilterConfig};
use crate::error::{SnapshotError, SnapshotResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;

/// Verdict for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Capture the file's bytes.
    Include,
    /// Keep a placeholder entry without reading the bytes.
    IncludeAsBinary,
    /// Leave the file out of the snapshot.
    Exclude(ExcludeReason),
}

/// Why a path was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeReason {
    ExcludedByPattern,
    NotInInclusionSet,
    BinaryFile,
    TooLarge,
}

impl ExcludeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExcludeReason::ExcludedByPattern => "excluded-by-pattern",
            ExcludeReason::NotInInclusionSet => "not-in-inclusion-set",
            ExcludeReason::BinaryFile => "binary",
            ExcludeReason::TooLarge => "too-large",
        }
    }
}

/// Decides, per path, whether a file belongs in a snapshot.
///
/// Decisions are a pure function of the path, the size, and the static
/// configuration compiled at construction time.
#[derive(Debug)]
pub struct FileFilter {
    exclusions: GlobSet,
    inclusions: GlobSet,
    has_inclusions: bool,
    binary_extensions: HashSet<String>,
    binary_handling: BinaryFileHandling,
    max_file_size: u64,
}

impl FileFilter {
    /// Compile the filter from configuration.
    ///
    /// Invalid glob patterns are a configuration error and fail fast.
    pub fn new(filter: &FilterConfig, file_handling: &FileHandlingConfig) -> SnapshotResult<Self> {
        let exclusions = compile_globset(&filter.default_exclusions)?;
        let inclusions = compile_globset(&filter.default_inclusions)?;

        let binary_extensions = filter
            .binary_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        Ok(Self {
            exclusions,
            inclusions,
            has_inclusions: !filter.default_inclusions.is_empty(),
            binary_extensions,
            binary_handling: file_handling.binary_file_handling,
            max_file_size: file_handling.max_file_size,
        })
    }

    /// Decide whether the file at `path` (a workspace-relative entry key)
    /// with the given size belongs in a snapshot. Rules apply in order,
    /// first match wins.
    pub fn decide(&self, path: &str, size: u64) -> FilterDecision {
        let as_path = Path::new(path);

        if self.exclusions.is_match(as_path) {
            return FilterDecision::Exclude(ExcludeReason::ExcludedByPattern);
        }

        if self.has_inclusions && !self.inclusions.is_match(as_path) {
            return FilterDecision::Exclude(ExcludeReason::NotInInclusionSet);
        }

        if self.is_binary(as_path) {
            return match self.binary_handling {
                BinaryFileHandling::Include => FilterDecision::IncludeAsBinary,
                BinaryFileHandling::Exclude => {
                    FilterDecision::Exclude(ExcludeReason::BinaryFile)
                }
            };
        }

        if size > self.max_file_size {
            return FilterDecision::Exclude(ExcludeReason::TooLarge);
        }

        FilterDecision::Include
    }

    fn is_binary(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| self.binary_extensions.contains(&ext))
    }
}

fn compile_globset(patterns: &[String]) -> SnapshotResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            SnapshotError::configuration(format!("invalid filter pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SnapshotError::configuration(format!("failed to build filter: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_with(filter: FilterConfig, file_handling: FileHandlingConfig) -> FileFilter {
        FileFilter::new(&filter, &file_handling).unwrap()
    }

    fn default_filter() -> FileFilter {
        filter_with(FilterConfig::default(), FileHandlingConfig::default())
    }

    #[test]
    fn excludes_by_pattern_first() {
        let filter = default_filter();
        assert_eq!(
            filter.decide("node_modules/left-pad/index.js", 100),
            FilterDecision::Exclude(ExcludeReason::ExcludedByPattern)
        );
        // Pattern wins even over the size rule
        assert_eq!(
            filter.decide("target/debug/huge.rlib", u64::MAX),
            FilterDecision::Exclude(ExcludeReason::ExcludedByPattern)
        );
    }

    #[test]
    fn empty_inclusion_set_passes_everything() {
        let filter = default_filter();
        assert_eq!(filter.decide("src/main.rs", 100), FilterDecision::Include);
    }

    #[test]
    fn inclusion_set_restricts() {
        let config = FilterConfig {
            default_inclusions: vec!["src/**".to_string()],
            ..FilterConfig::default()
        };
        let filter = filter_with(config, FileHandlingConfig::default());

        assert_eq!(filter.decide("src/lib.rs", 10), FilterDecision::Include);
        assert_eq!(
            filter.decide("docs/readme.md", 10),
            FilterDecision::Exclude(ExcludeReason::NotInInclusionSet)
        );
    }

    #[test]
    fn binary_extension_excluded_by_default() {
        let filter = default_filter();
        assert_eq!(
            filter.decide("assets/logo.png", 10),
            FilterDecision::Exclude(ExcludeReason::BinaryFile)
        );
        // Case-insensitive
        assert_eq!(
            filter.decide("assets/LOGO.PNG", 10),
            FilterDecision::Exclude(ExcludeReason::BinaryFile)
        );
    }

    #[test]
    fn binary_include_policy_yields_placeholder() {
        let file_handling = FileHandlingConfig {
            binary_file_handling: BinaryFileHandling::Include,
            ..FileHandlingConfig::default()
        };
        let filter = filter_with(FilterConfig::default(), file_handling);
        assert_eq!(
            filter.decide("assets/logo.png", 10),
            FilterDecision::IncludeAsBinary
        );
    }

    #[test]
    fn oversize_files_excluded() {
        let filter = default_filter();
        let limit = FileHandlingConfig::default().max_file_size;
        assert_eq!(filter.decide("big.log", limit), FilterDecision::Include);
        assert_eq!(
            filter.decide("big.log", limit + 1),
            FilterDecision::Exclude(ExcludeReason::TooLarge)
        );
    }

    #[test]
    fn decisions_are_deterministic() {
        let filter = default_filter();
        let first = filter.decide("src/deep/nested/mod.rs", 4096);
        for _ in 0..10 {
            assert_eq!(filter.decide("src/deep/nested/mod.rs", 4096), first);
        }
    }

    #[test]
    fn invalid_pattern_is_configuration_error() {
        let config = FilterConfig {
            default_exclusions: vec!["[".to_string()],
            ..FilterConfig::default()
        };
        let result = FileFilter::new(&config, &FileHandlingConfig::default());
        assert!(matches!(result, Err(SnapshotError::Configuration(_))));
    }

    #[test]
    fn exclude_reason_strings() {
        assert_eq!(ExcludeReason::BinaryFile.as_str(), "binary");
        assert_eq!(ExcludeReason::TooLarge.as_str(), "too-large");
    }
}
