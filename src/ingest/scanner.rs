//! Directory scanning for file-backed sources.
//!
//! A scan lists the directory once, sorts the matching names, and then
//! stats each file as the caller pulls it. Repeated scans of an unchanged
//! directory yield the same sequence.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::domain::FileDescriptor;
use crate::error::{EtlError, EtlResult};

/// Default file name pattern for JSON sources
pub const DEFAULT_PATTERN: &str = "*.json";

/// Which directory entries count as candidate input files
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pattern: Pattern,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            pattern: Pattern::new(DEFAULT_PATTERN).unwrap_or_default(),
        }
    }
}

impl MatchCriteria {
    /// Match file names against a glob pattern (e.g. `events-*.json`)
    pub fn new(pattern: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Pattern::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Hidden files never match, even with a `*` pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        self.pattern.matches_with(file_name, options)
    }
}

/// Lists candidate files in a directory
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    criteria: MatchCriteria,
}

impl DirectoryScanner {
    pub fn new(criteria: MatchCriteria) -> Self {
        Self { criteria }
    }

    /// Start a scan of `dir`.
    ///
    /// Fails with `SourceUnavailable` when the directory is missing or
    /// unreadable. An empty directory gives an empty scan. File size plays
    /// no part in matching, so zero-byte files are included.
    pub fn scan(&self, dir: &Path) -> EtlResult<Scan> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| EtlError::source_unavailable(dir, e))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EtlError::source_unavailable(dir, e))?;
            let file_name = entry.file_name();

            // Names that are not valid UTF-8 cannot match a pattern
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if self.criteria.matches(name) {
                candidates.push(entry.path());
            }
        }

        candidates.sort();

        tracing::debug!(
            dir = %dir.display(),
            pattern = self.criteria.pattern(),
            candidates = candidates.len(),
            "Scanned source directory"
        );

        Ok(Scan {
            entries: candidates.into_iter(),
            position: 0,
        })
    }
}

/// Lazy, finite sequence of files from one scan
#[derive(Debug)]
pub struct Scan {
    entries: std::vec::IntoIter<PathBuf>,
    position: usize,
}

impl Iterator for Scan {
    type Item = EtlResult<FileDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.entries.next()?;

            let metadata = match std::fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => return Some(Err(EtlError::source_unavailable(path, e))),
            };

            // Subdirectories whose names happen to match are not inputs
            if !metadata.is_file() {
                continue;
            }

            let descriptor = FileDescriptor {
                path,
                size_bytes: metadata.len(),
                discovered_at: self.position,
            };
            self.position += 1;

            return Some(Ok(descriptor));
        }
    }
}
