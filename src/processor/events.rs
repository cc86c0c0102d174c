//! Event extraction: activity-log records into the `users` and `time`
//! dimensions, plus the filtered song-play event set handed to the fact
//! joiner.

use crate::error::Result;
use crate::models::{EventRecord, TableWriteStats, TimeParts};
use crate::processor::sink::PartitionedSink;
use crate::schema::{NEXT_SONG_PAGE, TIME, USERS};

use polars::prelude::*;
use tracing::debug;

/// Song-play events with their derived timestamp fields.
///
/// Holds the raw log fields (`userId` already an integer) plus `timestamp`
/// (epoch seconds) and the calendar components `hour`, `day`, `week`, `month`,
/// `year`. Lives only for the duration of a run.
#[derive(Debug, Clone)]
pub struct EventSet {
    frame: DataFrame,
}

impl EventSet {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

#[derive(Debug, Clone)]
pub struct EventExtractor {
    sink: PartitionedSink,
}

impl EventExtractor {
    pub fn new(sink: PartitionedSink) -> Self {
        Self { sink }
    }

    /// Filter to song plays, persist `users` and `time`, return the event set
    pub fn extract(&self, records: &[EventRecord]) -> Result<(EventSet, Vec<TableWriteStats>)> {
        let events = build_event_set(records)?;
        let users = self.sink.write_table(&USERS, &users_table(&events)?)?;
        let time = self.sink.write_table(&TIME, &time_table(&events)?)?;
        Ok((events, vec![users, time]))
    }
}

/// Keep only `NextSong` events and derive the timestamp fields from `ts`
pub fn build_event_set(records: &[EventRecord]) -> Result<EventSet> {
    let frame = log_frame(records)?
        .lazy()
        .filter(col("page").eq(lit(NEXT_SONG_PAGE)))
        .with_column((col("ts").cast(DataType::Float64) / lit(1000.0)).alias("timestamp"))
        .collect()?;

    debug!(
        "Kept {} song-play events out of {} log records",
        frame.height(),
        records.len()
    );
    Ok(EventSet { frame })
}

/// One `users` row per song-play event; repeated users are not collapsed
pub fn users_table(events: &EventSet) -> Result<DataFrame> {
    Ok(events
        .frame
        .clone()
        .lazy()
        .select([
            col("userId").alias("user_id"),
            col("firstName").alias("first_name"),
            col("lastName").alias("last_name"),
            col("gender"),
            col("level"),
        ])
        .collect()?)
}

/// One `time` row per song-play event; repeated timestamps are not collapsed
pub fn time_table(events: &EventSet) -> Result<DataFrame> {
    Ok(events
        .frame
        .clone()
        .lazy()
        .select([
            col("timestamp").alias("start_time"),
            col("hour"),
            col("day"),
            col("week"),
            col("month"),
            col("year"),
        ])
        .collect()?)
}

fn log_frame(records: &[EventRecord]) -> Result<DataFrame> {
    let parts: Vec<Option<TimeParts>> = records
        .iter()
        .map(|r| r.ts.and_then(TimeParts::from_epoch_millis))
        .collect();
    let frame = df!(
        "page" => column(records, |r| r.page.clone()),
        "userId" => column(records, |r| r.user_id),
        "firstName" => column(records, |r| r.first_name.clone()),
        "lastName" => column(records, |r| r.last_name.clone()),
        "gender" => column(records, |r| r.gender.clone()),
        "level" => column(records, |r| r.level.clone()),
        "song" => column(records, |r| r.song.clone()),
        "ts" => column(records, |r| r.ts),
        "sessionId" => column(records, |r| r.session_id),
        "location" => column(records, |r| r.location.clone()),
        "userAgent" => column(records, |r| r.user_agent.clone()),
        "hour" => part_column(&parts, |p| p.hour),
        "day" => part_column(&parts, |p| p.day),
        "week" => part_column(&parts, |p| p.week),
        "month" => part_column(&parts, |p| p.month),
        "year" => part_column(&parts, |p| p.year),
    )?;
    Ok(frame)
}

fn part_column(parts: &[Option<TimeParts>], field: impl Fn(&TimeParts) -> i32) -> Vec<Option<i32>> {
    parts.iter().map(|p| p.as_ref().map(&field)).collect()
}

fn column<T>(records: &[EventRecord], field: impl Fn(&EventRecord) -> Option<T>) -> Vec<Option<T>> {
    records.iter().map(field).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgorithm;
    use tempfile::TempDir;

    fn event(page: &str, user_id: i32, song: &str, ts: i64) -> EventRecord {
        EventRecord {
            page: Some(page.to_string()),
            user_id: Some(user_id),
            first_name: Some("Ann".to_string()),
            last_name: Some("Lee".to_string()),
            gender: Some("F".to_string()),
            level: Some("free".to_string()),
            song: Some(song.to_string()),
            ts: Some(ts),
            session_id: Some(1),
            location: Some("NY".to_string()),
            user_agent: Some("X".to_string()),
        }
    }

    fn f64_values(frame: &DataFrame, name: &str) -> Vec<Option<f64>> {
        frame
            .column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn i32_values(frame: &DataFrame, name: &str) -> Vec<Option<i32>> {
        frame
            .column(name)
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_only_next_song_events_survive() {
        let records = [
            event("NextSong", 10, "A", 1_541_440_000_000),
            event("Home", 11, "B", 1_541_440_001_000),
            event("Logout", 12, "C", 1_541_440_002_000),
        ];

        let events = build_event_set(&records).unwrap();
        let users = users_table(&events).unwrap();
        let time = time_table(&events).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(i32_values(&users, "user_id"), vec![Some(10)]);
        assert_eq!(time.height(), 1);
    }

    #[test]
    fn test_missing_page_is_discarded() {
        let mut no_page = event("NextSong", 10, "A", 1_541_440_000_000);
        no_page.page = None;

        let events = build_event_set(&[no_page]).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn test_time_table_derivation() {
        let events = build_event_set(&[event("NextSong", 10, "A", 1_541_440_000_500)]).unwrap();
        let time = time_table(&events).unwrap();

        let names: Vec<&str> = time
            .get_column_names()
            .into_iter()
            .map(|n| n.as_str())
            .collect();
        assert_eq!(names, TIME.column_names());
        assert_eq!(f64_values(&time, "start_time"), vec![Some(1_541_440_000.5)]);
        assert_eq!(i32_values(&time, "hour"), vec![Some(17)]);
        assert_eq!(i32_values(&time, "day"), vec![Some(5)]);
        assert_eq!(i32_values(&time, "week"), vec![Some(45)]);
        assert_eq!(i32_values(&time, "month"), vec![Some(11)]);
        assert_eq!(i32_values(&time, "year"), vec![Some(2018)]);
    }

    #[test]
    fn test_repeated_users_and_timestamps_are_not_deduplicated() {
        let records = [
            event("NextSong", 10, "A", 1_541_440_000_000),
            event("NextSong", 10, "B", 1_541_440_000_000),
        ];

        let events = build_event_set(&records).unwrap();

        assert_eq!(users_table(&events).unwrap().height(), 2);
        assert_eq!(time_table(&events).unwrap().height(), 2);
    }

    #[test]
    fn test_missing_ts_yields_null_time_fields() {
        let mut no_ts = event("NextSong", 10, "A", 0);
        no_ts.ts = None;

        let events = build_event_set(&[no_ts]).unwrap();
        let time = time_table(&events).unwrap();

        assert_eq!(f64_values(&time, "start_time"), vec![None]);
        assert_eq!(i32_values(&time, "year"), vec![None]);
    }

    #[test]
    fn test_extract_writes_users_and_time() {
        let temp_dir = TempDir::new().unwrap();
        let sink = PartitionedSink::new(temp_dir.path().to_path_buf(), CompressionAlgorithm::Snappy);
        let extractor = EventExtractor::new(sink);

        let (events, stats) = extractor
            .extract(&[event("NextSong", 10, "A", 1_541_440_000_000)])
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(stats[0].table, "users");
        assert_eq!(stats[1].table, "time");
        assert!(temp_dir.path().join("time").join("year=2018").join("month=11").is_dir());
        assert!(temp_dir.path().join("users").join("_SUCCESS").is_file());
    }
}
