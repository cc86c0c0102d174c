//! Core data structures for the star-schema build.
//!
//! Defines the typed raw records read from the song catalog and the
//! activity log, the calendar decomposition of event timestamps, and the
//! statistics reported by a run.

use crate::coercion::Coercer;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// One song-catalog entry with its fields already coerced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongRecord {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

impl SongRecord {
    pub fn from_json(fields: &Map<String, Value>, coercer: &mut Coercer) -> Self {
        Self {
            song_id: coercer.text(fields, "song_id"),
            title: coercer.text(fields, "title"),
            artist_id: coercer.text(fields, "artist_id"),
            artist_name: coercer.text(fields, "artist_name"),
            artist_location: coercer.text(fields, "artist_location"),
            artist_latitude: coercer.float64(fields, "artist_latitude"),
            artist_longitude: coercer.float64(fields, "artist_longitude"),
            year: coercer.int32(fields, "year"),
            duration: coercer.float64(fields, "duration"),
        }
    }
}

/// One activity-log entry with its fields already coerced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    pub page: Option<String>,
    pub user_id: Option<i32>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub song: Option<String>,
    pub ts: Option<i64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl EventRecord {
    pub fn from_json(fields: &Map<String, Value>, coercer: &mut Coercer) -> Self {
        Self {
            page: coercer.text(fields, "page"),
            user_id: coercer.int32(fields, "userId"),
            first_name: coercer.text(fields, "firstName"),
            last_name: coercer.text(fields, "lastName"),
            gender: coercer.text(fields, "gender"),
            level: coercer.text(fields, "level"),
            song: coercer.text(fields, "song"),
            ts: coercer.int64(fields, "ts"),
            session_id: coercer.int64(fields, "sessionId"),
            location: coercer.text(fields, "location"),
            user_agent: coercer.text(fields, "userAgent"),
        }
    }
}

/// Calendar components of an event timestamp, evaluated in UTC.
///
/// Both the time dimension and the songplay partition keys go through
/// [`TimeParts::from_epoch_millis`], so the two always agree for a given `ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub hour: i32,
    pub day: i32,
    /// ISO 8601 week of year
    pub week: i32,
    pub month: i32,
    pub year: i32,
}

impl TimeParts {
    pub fn from_epoch_millis(ts: i64) -> Option<Self> {
        let datetime: DateTime<Utc> = DateTime::from_timestamp_millis(ts)?;
        Some(Self {
            hour: datetime.hour() as i32,
            day: datetime.day() as i32,
            week: datetime.iso_week().week() as i32,
            month: datetime.month() as i32,
            year: datetime.year(),
        })
    }
}

/// Counters collected while reading raw input files
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub files_read: usize,
    pub records_read: usize,
    pub malformed_lines: usize,
    pub coercion_failures: usize,
}

impl ReadStats {
    pub fn absorb(&mut self, other: &ReadStats) {
        self.files_read += other.files_read;
        self.records_read += other.records_read;
        self.malformed_lines += other.malformed_lines;
        self.coercion_failures += other.coercion_failures;
    }
}

/// Result of persisting one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableWriteStats {
    pub table: String,
    pub rows: usize,
    pub partitions: usize,
    pub path: PathBuf,
}

/// Processing statistics
#[derive(Debug, Default, Serialize)]
pub struct ProcessingStats {
    pub song_data: ReadStats,
    pub log_data: ReadStats,
    pub song_play_events: usize,
    pub tables: Vec<TableWriteStats>,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}

impl ProcessingStats {
    /// Write statistics for the named table
    pub fn table(&self, name: &str) -> Option<&TableWriteStats> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Rows written for the named table, zero when the table is unknown
    pub fn rows(&self, name: &str) -> usize {
        self.table(name).map(|t| t.rows).unwrap_or(0)
    }
}
