//! Newline-delimited JSON record reader
//!
//! Parses input files concurrently (bounded, file order preserved) into typed
//! raw records. Lines that are not JSON objects (invalid UTF-8 included) are
//! skipped and counted; an unreadable file aborts the run.

use crate::coercion::Coercer;
use crate::error::{EtlError, Result};
use crate::models::ReadStats;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, warn};

/// Builds a typed record from one JSON object
pub type RecordParser<T> = fn(&Map<String, Value>, &mut Coercer) -> T;

#[derive(Debug, Clone)]
pub struct JsonRecordReader {
    max_concurrent_files: usize,
    show_progress: bool,
}

impl JsonRecordReader {
    pub fn new(max_concurrent_files: usize) -> Self {
        Self {
            max_concurrent_files: max_concurrent_files.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Read every record from `files`, in file order then line order
    pub async fn read_records<T>(
        &self,
        files: &[PathBuf],
        label: &str,
        parse: RecordParser<T>,
    ) -> Result<(Vec<T>, ReadStats)>
    where
        T: Send + 'static,
    {
        let pb = if self.show_progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(format!("Reading {}", label));

        let results = stream::iter(files.iter().cloned())
            .map(|path| {
                let pb = pb.clone();
                async move {
                    let task_path = path.clone();
                    let outcome = task::spawn_blocking(move || parse_file(&task_path, parse))
                        .await
                        .map_err(|e| EtlError::ReadFailed {
                            path,
                            reason: format!("reader task failed: {}", e),
                        })?;
                    pb.inc(1);
                    outcome
                }
            })
            .buffered(self.max_concurrent_files)
            .collect::<Vec<_>>()
            .await;

        let mut records = Vec::new();
        let mut stats = ReadStats::default();
        for result in results {
            let (file_records, file_stats) = result?;
            records.extend(file_records);
            stats.absorb(&file_stats);
        }

        pb.finish_with_message(format!("Read {} {} records", stats.records_read, label));
        debug!(
            "Read {} {} records from {} files ({} malformed lines, {} coercion failures)",
            stats.records_read,
            label,
            stats.files_read,
            stats.malformed_lines,
            stats.coercion_failures
        );
        Ok((records, stats))
    }
}

/// Parse one file; each non-blank line holds one JSON object
fn parse_file<T>(path: &Path, parse: RecordParser<T>) -> Result<(Vec<T>, ReadStats)> {
    let read_failed = |e: std::io::Error| EtlError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let reader = BufReader::new(File::open(path).map_err(read_failed)?);

    let mut coercer = Coercer::new();
    let mut records = Vec::new();
    let mut malformed_lines = 0;

    // invalid UTF-8 is a malformed line, not a read failure
    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(read_failed)?;
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_slice::<Value>(trimmed) {
            Ok(Value::Object(fields)) => records.push(parse(&fields, &mut coercer)),
            Ok(_) => {
                malformed_lines += 1;
                warn!(
                    "Skipping non-object record at {}:{}",
                    path.display(),
                    index + 1
                );
            }
            Err(e) => {
                malformed_lines += 1;
                warn!(
                    "Skipping malformed JSON at {}:{}: {}",
                    path.display(),
                    index + 1,
                    e
                );
            }
        }
    }

    let stats = ReadStats {
        files_read: 1,
        records_read: records.len(),
        malformed_lines,
        coercion_failures: coercer.failures(),
    };
    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventRecord, SongRecord};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_lines_in_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.json");
        let second = temp_dir.path().join("b.json");
        fs::write(
            &first,
            "{\"page\":\"NextSong\",\"ts\":1}\n\n{\"page\":\"Home\",\"ts\":2}\n",
        )
        .unwrap();
        fs::write(&second, "{\"page\":\"NextSong\",\"ts\":3}").unwrap();

        let reader = JsonRecordReader::new(4);
        let (records, stats) = reader
            .read_records(&[first, second], "log", EventRecord::from_json)
            .await
            .unwrap();

        let ts: Vec<_> = records.iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.malformed_lines, 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("songs.json");
        fs::write(
            &path,
            "{\"song_id\":\"S1\",\"year\":\"unknown\"}\nnot json at all\n[1,2,3]\n",
        )
        .unwrap();

        let reader = JsonRecordReader::new(1);
        let (records, stats) = reader
            .read_records(&[path], "song", SongRecord::from_json)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].song_id.as_deref(), Some("S1"));
        assert_eq!(records[0].year, None);
        assert_eq!(stats.malformed_lines, 2);
        assert_eq!(stats.coercion_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.json");
        let mut bytes = b"{\"page\":\"NextSong\",\"ts\":1}\r\n".to_vec();
        bytes.extend_from_slice(b"{\"page\":\"Next\xffSong\",\"ts\":2}\n");
        bytes.extend_from_slice(b"{\"page\":\"Home\",\"ts\":3}\n");
        fs::write(&path, bytes).unwrap();

        let reader = JsonRecordReader::new(1);
        let (records, stats) = reader
            .read_records(&[path], "log", EventRecord::from_json)
            .await
            .unwrap();

        let ts: Vec<_> = records.iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![Some(1), Some(3)]);
        assert_eq!(stats.records_read, 2);
        assert_eq!(stats.malformed_lines, 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vanished.json");

        let reader = JsonRecordReader::new(2);
        let result = reader
            .read_records(&[path.clone()], "song", SongRecord::from_json)
            .await;

        match result {
            Err(EtlError::ReadFailed { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("Expected ReadFailed error, got {:?}", other.map(|(r, _)| r.len())),
        }
    }

    #[tokio::test]
    async fn test_no_files() {
        let reader = JsonRecordReader::new(2);
        let (records, stats) = reader
            .read_records(&[], "song", SongRecord::from_json)
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(stats, ReadStats::default());
    }
}
