//! Configuration management and validation.
//!
//! Provides the run configuration: input and output locations, storage
//! credentials, input file patterns, Parquet compression and the surrogate
//! key strategy used for fact rows.

use crate::error::{EtlError, Result};
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Largest block size for partition-tagged keys; offsets occupy the low 33 bits
pub const MAX_ROWS_PER_PARTITION: usize = 1 << 33;

/// Block size used when partition-tagged keys are requested without one
pub const DEFAULT_ROWS_PER_PARTITION: usize = 1 << 20;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    #[default]
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }

    /// Codec tag used in data file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Snappy => "snappy",
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Uncompressed => "uncompressed",
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "lz4" => Ok(Self::Lz4),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => Err(EtlError::Configuration {
                message: format!(
                    "unknown compression '{}' (expected snappy, zstd, lz4 or none)",
                    other
                ),
            }),
        }
    }
}

/// How `songplay_id` values are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IdStrategy {
    /// Single-writer sequence starting at zero
    #[default]
    Sequential,
    /// Partition index in the high bits, offset within the partition in the low 33 bits
    PartitionTagged { rows_per_partition: usize },
}

impl IdStrategy {
    /// Block sizes must leave room for at least one key and fit the offset bits
    pub fn validate(&self) -> Result<()> {
        if let Self::PartitionTagged { rows_per_partition } = *self {
            if rows_per_partition == 0 || rows_per_partition > MAX_ROWS_PER_PARTITION {
                return Err(EtlError::Configuration {
                    message: format!(
                        "rows_per_partition must be between 1 and {}, got {}",
                        MAX_ROWS_PER_PARTITION, rows_per_partition
                    ),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for IdStrategy {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "partition-tagged" | "partition_tagged" => Ok(Self::PartitionTagged {
                rows_per_partition: DEFAULT_ROWS_PER_PARTITION,
            }),
            other => Err(EtlError::Configuration {
                message: format!(
                    "unknown id strategy '{}' (expected sequential or partition-tagged)",
                    other
                ),
            }),
        }
    }
}

/// Access credentials handed to the storage layer at construction
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root containing the song_data and log_data trees
    pub input_path: PathBuf,

    /// Root under which the five tables are written
    pub output_path: PathBuf,

    pub credentials: Option<Credentials>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data"),
            output_path: PathBuf::from("lake"),
            credentials: None,
        }
    }
}

/// Global configuration for a star-schema build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub storage: StorageConfig,

    /// Glob, relative to the input root, matching song-catalog files
    pub song_data_pattern: String,

    /// Glob, relative to the input root, matching activity-log files
    pub log_data_pattern: String,

    /// Maximum input files parsed concurrently
    pub max_concurrent_files: usize,

    pub compression: CompressionAlgorithm,

    pub id_strategy: IdStrategy,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            song_data_pattern: "song_data/**/*.json".to_string(),
            log_data_pattern: "log_data/**/*.json".to_string(),
            max_concurrent_files: num_cpus::get().max(1),
            compression: CompressionAlgorithm::default(),
            id_strategy: IdStrategy::default(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from a TOML file; absent keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| EtlError::Configuration {
            message: format!("invalid config file {}: {}", path.display(), e),
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.input_path = path.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.output_path = path.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.storage.credentials = Some(credentials);
        self
    }

    pub fn with_song_data_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.song_data_pattern = pattern.into();
        self
    }

    pub fn with_log_data_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.log_data_pattern = pattern.into();
        self
    }

    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    /// Check the configuration before any data is touched
    pub fn validate(&self) -> Result<()> {
        for location in [&self.storage.input_path, &self.storage.output_path] {
            let text = location.to_string_lossy();
            if text.contains("://") {
                return Err(EtlError::UnsupportedLocation {
                    location: text.into_owned(),
                });
            }
        }

        if self.max_concurrent_files == 0 {
            return Err(EtlError::Configuration {
                message: "max_concurrent_files must be at least 1".to_string(),
            });
        }

        self.id_strategy.validate()?;

        Ok(())
    }
}
