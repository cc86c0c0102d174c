//! Fact joining: song-play events reconciled against the persisted `songs`
//! table to build `songplays`.
//!
//! Events match catalog entries on exact title equality only. A title shared
//! by several catalog songs yields one fact row per song; an event whose title
//! is not in the catalog yields no fact row.

use crate::config::IdStrategy;
use crate::error::Result;
use crate::models::{TableWriteStats, TimeParts};
use crate::processor::events::EventSet;
use crate::processor::keys::KeyAllocator;
use crate::processor::sink::PartitionedSink;
use crate::schema::{SONGPLAYS, SONGS};

use polars::prelude::*;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FactJoiner {
    sink: PartitionedSink,
    id_strategy: IdStrategy,
}

impl FactJoiner {
    pub fn new(sink: PartitionedSink, id_strategy: IdStrategy) -> Self {
        Self { sink, id_strategy }
    }

    /// Join against the `songs` table as stored, then persist `songplays`.
    ///
    /// The catalog must already have been written: it is read back from the
    /// sink rather than taken from memory.
    pub fn build(&self, events: &EventSet) -> Result<(DataFrame, TableWriteStats)> {
        let songs = self.sink.read_table(&SONGS)?;
        let mut allocator = KeyAllocator::new(self.id_strategy)?;
        let songplays = join_songplays(events, &songs, &mut allocator)?;
        let stats = self.sink.write_table(&SONGPLAYS, &songplays)?;
        Ok((songplays, stats))
    }
}

/// Build the `songplays` frame, `year`/`month` partition columns included
pub fn join_songplays(
    events: &EventSet,
    songs: &DataFrame,
    allocator: &mut KeyAllocator,
) -> Result<DataFrame> {
    let catalog = songs
        .clone()
        .lazy()
        .select([col("title"), col("song_id"), col("artist_id")]);

    let mut plays = events
        .frame()
        .clone()
        .lazy()
        .select([
            col("song"),
            col("timestamp"),
            col("userId"),
            col("level"),
            col("sessionId"),
            col("location"),
            col("userAgent"),
            col("ts"),
        ])
        .join(
            catalog,
            [col("song")],
            [col("title")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col("timestamp").alias("start_time"),
            col("userId").alias("user_id"),
            col("level"),
            col("song_id"),
            col("artist_id"),
            col("sessionId").alias("session_id"),
            col("location"),
            col("userAgent").alias("user_agent"),
            col("ts"),
        ])
        .collect()?;

    debug!(
        "Matched {} fact rows from {} song-play events",
        plays.height(),
        events.len()
    );

    let ids = allocator.allocate(plays.height());
    plays.insert_column(0, Column::new("songplay_id".into(), ids))?;

    let (years, months): (Vec<Option<i32>>, Vec<Option<i32>>) = plays
        .column("ts")?
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|ts| {
            let parts = ts.and_then(TimeParts::from_epoch_millis);
            (parts.map(|p| p.year), parts.map(|p| p.month))
        })
        .unzip();
    plays.with_column(Column::new("year".into(), years))?;
    plays.with_column(Column::new("month".into(), months))?;

    Ok(plays.drop("ts")?)
}
