//! Input file discovery
//!
//! Resolves the song-data and log-data glob patterns against the input root.
//! The raw datasets are sharded into nested directories (by track-id prefix
//! for songs, by year/month for logs), so patterns default to `**` matches.

use crate::error::{EtlError, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File discovery component for raw JSON inputs
#[derive(Debug, Clone)]
pub struct InputDiscovery {
    input_root: PathBuf,
}

impl InputDiscovery {
    pub fn new(input_root: PathBuf) -> Self {
        Self { input_root }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    /// Files under the input root matching `pattern`, in sorted order
    pub fn discover(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        if !self.input_root.is_dir() {
            return Err(EtlError::InputNotFound {
                path: self.input_root.clone(),
            });
        }

        let full_pattern = format!(
            "{}/{}",
            Pattern::escape(&self.input_root.to_string_lossy()),
            pattern.trim_start_matches('/')
        );
        debug!("Searching for input files matching: {}", full_pattern);

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let entries =
            glob::glob_with(&full_pattern, options).map_err(|e| EtlError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| EtlError::ReadFailed {
                path: e.path().to_path_buf(),
                reason: e.to_string(),
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        debug!("Found {} files for pattern {}", files.len(), pattern);
        Ok(files)
    }
}
