//! Songplays ETL Library
//!
//! Turns the raw song catalog (one JSON object per song) and the listening
//! activity log (JSON lines) into a star schema written as partitioned Apache
//! Parquet tables.
//!
//! This library provides tools for:
//! - Discovering and reading raw JSON inputs with permissive type coercion
//! - Extracting the `songs`, `artists`, `users` and `time` dimensions
//! - Joining song-play events against the stored catalog to build `songplays`
//! - Writing and reading Hive-style partitioned Parquet tables

pub mod cli;
pub mod coercion;
pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod schema;

// Re-export commonly used types
pub use config::EtlConfig;
pub use error::{EtlError, Result};
pub use models::ProcessingStats;
pub use processor::Pipeline;
