//! Error handling for star-schema build operations.
//!
//! Provides error types with context for input discovery, record reading,
//! table persistence and configuration failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input location not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Invalid input pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to read input file: {path} - {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Failed to write table '{table}' at {path} - {reason}")]
    WriteFailed {
        table: String,
        path: PathBuf,
        reason: String,
    },

    #[error(
        "Partition column '{column}' of table '{table}' has type {found}, expected {expected}"
    )]
    PartitionSchemaMismatch {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("Table '{table}' not found at {path}")]
    TableNotFound { table: String, path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unsupported storage location '{location}': only local filesystem paths are supported")]
    UnsupportedLocation { location: String },

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl EtlError {
    /// Wrap a blocking-task join failure for the named stage
    pub fn stage(stage: &'static str, error: tokio::task::JoinError) -> Self {
        Self::StageFailed {
            stage,
            reason: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
