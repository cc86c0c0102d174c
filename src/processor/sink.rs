//! Partitioned Parquet sink for star-schema tables
//!
//! Writes each table as a Hive-style directory tree
//! (`<table>/<key>=<value>/part-00000.<codec>.parquet`) with full-overwrite
//! semantics, and scans a persisted table back with its partition columns
//! decoded from the directory names.

use crate::config::CompressionAlgorithm;
use crate::error::{EtlError, Result};
use crate::models::TableWriteStats;
use crate::schema::TableSpec;

use polars::io::HiveOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory value used for null and empty partition keys
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Marker file closing a completely written table
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Table writer/reader rooted at the output location
#[derive(Debug, Clone)]
pub struct PartitionedSink {
    base_path: PathBuf,
    compression: CompressionAlgorithm,
}

impl PartitionedSink {
    pub fn new(base_path: PathBuf, compression: CompressionAlgorithm) -> Self {
        Self {
            base_path,
            compression,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the named table
    pub fn table_path(&self, table: &TableSpec) -> PathBuf {
        self.base_path.join(table.name)
    }

    /// Replace the stored table with `frame`.
    ///
    /// The table is assembled in a hidden staging directory and only swapped
    /// into place once every file is written, so a failed write never leaves a
    /// half-written table behind under the table name.
    pub fn write_table(&self, table: &TableSpec, frame: &DataFrame) -> Result<TableWriteStats> {
        validate_partition_columns(table, frame)?;

        let target = self.table_path(table);
        let staging = self.base_path.join(format!(".{}.staging", table.name));
        let write_failed = |reason: String| EtlError::WriteFailed {
            table: table.name.to_string(),
            path: target.clone(),
            reason,
        };

        if staging.exists() {
            fs::remove_dir_all(&staging)
                .map_err(|e| write_failed(format!("cannot clear staging area: {}", e)))?;
        }
        fs::create_dir_all(&staging)
            .map_err(|e| write_failed(format!("cannot create staging area: {}", e)))?;

        let partitions = if table.is_partitioned() {
            let parts = if frame.height() == 0 {
                Vec::new()
            } else {
                frame.partition_by_stable(table.partition_columns(), true)?
            };
            for part in &parts {
                let dir = staging.join(partition_dir(table, part)?);
                fs::create_dir_all(&dir)
                    .map_err(|e| write_failed(format!("cannot create {}: {}", dir.display(), e)))?;
                let data = part.select(data_columns(table, part))?;
                self.write_parquet(table, &dir.join(self.part_file_name(0)), data)?;
            }
            parts.len()
        } else {
            self.write_parquet(table, &staging.join(self.part_file_name(0)), frame.clone())?;
            1
        };

        File::create(staging.join(SUCCESS_MARKER))
            .map_err(|e| write_failed(format!("cannot write success marker: {}", e)))?;

        if target.exists() {
            fs::remove_dir_all(&target)
                .map_err(|e| write_failed(format!("cannot remove previous output: {}", e)))?;
        }
        fs::rename(&staging, &target)
            .map_err(|e| write_failed(format!("cannot move staged table into place: {}", e)))?;

        info!(
            "Wrote table '{}': {} rows in {} partition(s)",
            table.name,
            frame.height(),
            partitions
        );

        Ok(TableWriteStats {
            table: table.name.to_string(),
            rows: frame.height(),
            partitions,
            path: target,
        })
    }

    /// Load a persisted table in its declared column order.
    ///
    /// Partition columns are decoded from the `key=value` directories with the
    /// key types declared on the table. A table with no data files reads back
    /// as an empty frame carrying the full table schema.
    pub fn read_table(&self, table: &TableSpec) -> Result<DataFrame> {
        let root = self.table_path(table);
        if !root.join(SUCCESS_MARKER).is_file() {
            return Err(EtlError::TableNotFound {
                table: table.name.to_string(),
                path: root,
            });
        }

        if !has_data_files(&root)? {
            debug!("Table '{}' has no data files", table.name);
            return Ok(table.empty_frame());
        }

        let hive_options = if table.is_partitioned() {
            HiveOptions {
                enabled: Some(true),
                hive_start_idx: 0,
                schema: Some(Arc::new(table.partition_schema())),
                try_parse_dates: false,
            }
        } else {
            HiveOptions::new_disabled()
        };
        let args = ScanArgsParquet {
            hive_options,
            ..Default::default()
        };

        let columns: Vec<Expr> = table.column_names().into_iter().map(col).collect();
        let frame = LazyFrame::scan_parquet(&root, args)?
            .select(columns)
            .collect()?;

        debug!("Read {} rows from {}", frame.height(), root.display());
        Ok(frame)
    }

    fn part_file_name(&self, index: usize) -> String {
        format!("part-{:05}.{}.parquet", index, self.compression.file_tag())
    }

    fn write_parquet(&self, table: &TableSpec, path: &Path, mut frame: DataFrame) -> Result<()> {
        let file = File::create(path).map_err(|e| EtlError::WriteFailed {
            table: table.name.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        ParquetWriter::new(file)
            .with_compression(self.compression.to_polars_compression())
            .with_statistics(StatisticsOptions::full())
            .finish(&mut frame)
            .map_err(|e| EtlError::WriteFailed {
                table: table.name.to_string(),
                path: path.to_path_buf(),
                reason: format!("Failed to write parquet: {}", e),
            })?;

        Ok(())
    }
}

/// Every declared partition key must be present with its declared type
fn validate_partition_columns(table: &TableSpec, frame: &DataFrame) -> Result<()> {
    for &key in table.partition_by {
        let Some(kind) = table.kind_of(key) else {
            continue;
        };
        let expected = kind.dtype();
        let found = match frame.column(key) {
            Ok(column) => column.dtype().clone(),
            Err(_) => {
                return Err(EtlError::PartitionSchemaMismatch {
                    table: table.name.to_string(),
                    column: key.to_string(),
                    expected: expected.to_string(),
                    found: "missing column".to_string(),
                });
            }
        };

        if found != expected {
            return Err(EtlError::PartitionSchemaMismatch {
                table: table.name.to_string(),
                column: key.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}

/// Columns stored inside the data files of a partition
fn data_columns(table: &TableSpec, frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .into_iter()
        .filter(|name| !table.is_partition_column(name.as_str()))
        .map(|name| name.to_string())
        .collect()
}

/// Relative `key=value/...` directory for a single-partition frame
fn partition_dir(table: &TableSpec, part: &DataFrame) -> Result<PathBuf> {
    let mut dir = PathBuf::new();
    for &key in table.partition_by {
        let value = part.column(key)?.get(0)?;
        dir.push(format!("{}={}", key, render_partition_value(&value)));
    }
    Ok(dir)
}

/// Null and empty values share the default partition
fn render_partition_value(value: &AnyValue<'_>) -> String {
    match value.get_str() {
        _ if value.is_null() => DEFAULT_PARTITION.to_string(),
        Some("") => DEFAULT_PARTITION.to_string(),
        Some(text) => escape_path_value(text),
        None => escape_path_value(&value.to_string()),
    }
}

fn needs_escape(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
        )
}

/// Percent-escape characters that are unsafe inside a partition directory name
pub fn escape_path_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02X}", byte));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn has_data_files(root: &Path) -> Result<bool> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| EtlError::ReadFailed {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_parquet_file(entry.path()) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_parquet_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "parquet")
}
