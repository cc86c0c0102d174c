//! Main processing engine with modular architecture.
//!
//! Orchestrates the star-schema build using specialized modules for input
//! discovery, record reading, the catalog and event extractors, the fact
//! joiner and the partitioned Parquet sink.
//!
//! Catalog and event extraction run concurrently. The fact joiner starts
//! only once both have finished, which guarantees the `songs` table it
//! reads back is fully on disk.

pub mod catalog;
pub mod discovery;
pub mod events;
pub mod facts;
pub mod keys;
pub mod reader;
pub mod sink;

#[cfg(test)]
pub mod tests;

use self::{
    catalog::CatalogExtractor,
    discovery::InputDiscovery,
    events::{EventExtractor, EventSet},
    facts::FactJoiner,
    reader::JsonRecordReader,
    sink::PartitionedSink,
};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::models::{EventRecord, ProcessingStats, ReadStats, SongRecord, TableWriteStats};

use std::time::Instant;
use tokio::task;
use tracing::{debug, info};

/// Outcome of the catalog branch
struct CatalogOutcome {
    read: ReadStats,
    tables: Vec<TableWriteStats>,
}

/// Outcome of the event branch
struct EventOutcome {
    read: ReadStats,
    events: EventSet,
    tables: Vec<TableWriteStats>,
}

/// Main processor for the star-schema build
#[derive(Debug)]
pub struct Pipeline {
    config: EtlConfig,
    discovery: InputDiscovery,
    reader: JsonRecordReader,
    sink: PartitionedSink,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: EtlConfig) -> Result<Self> {
        config.validate()?;

        let storage = &config.storage;
        if !storage.input_path.is_dir() {
            return Err(EtlError::InputNotFound {
                path: storage.input_path.clone(),
            });
        }
        if let Some(credentials) = &storage.credentials {
            debug!(
                "Storage credentials supplied for access key {}",
                credentials.access_key_id
            );
        }

        Ok(Self {
            discovery: InputDiscovery::new(storage.input_path.clone()),
            reader: JsonRecordReader::new(config.max_concurrent_files),
            sink: PartitionedSink::new(storage.output_path.clone(), config.compression),
            config,
        })
    }

    /// Show progress bars while reading input files
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.reader = self.reader.with_progress(show_progress);
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Sink rooted at the configured output location
    pub fn sink(&self) -> &PartitionedSink {
        &self.sink
    }

    /// Main processing entry point
    pub async fn run(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        info!(
            "Building star schema from {} into {}",
            self.config.storage.input_path.display(),
            self.config.storage.output_path.display()
        );

        std::fs::create_dir_all(&self.config.storage.output_path).map_err(|e| {
            EtlError::WriteFailed {
                table: "*".to_string(),
                path: self.config.storage.output_path.clone(),
                reason: e.to_string(),
            }
        })?;

        let (catalog, events) = tokio::try_join!(self.process_song_data(), self.process_log_data())?;

        let joiner = FactJoiner::new(self.sink.clone(), self.config.id_strategy);
        let event_set = events.events;
        let song_play_events = event_set.len();
        let (_, songplays) = task::spawn_blocking(move || joiner.build(&event_set))
            .await
            .map_err(|e| EtlError::stage("songplays", e))??;

        let mut tables = catalog.tables;
        tables.extend(events.tables);
        tables.push(songplays);

        let processing_time_ms = start_time.elapsed().as_millis();
        info!(
            "Star schema complete: {} fact rows in {}ms",
            tables.last().map(|t| t.rows).unwrap_or(0),
            processing_time_ms
        );

        Ok(ProcessingStats {
            song_data: catalog.read,
            log_data: events.read,
            song_play_events,
            tables,
            output_path: self.config.storage.output_path.clone(),
            processing_time_ms,
        })
    }

    /// Read the song catalog and persist `songs` and `artists`
    async fn process_song_data(&self) -> Result<CatalogOutcome> {
        let files = self.discovery.discover(&self.config.song_data_pattern)?;
        info!("Found {} song data files", files.len());

        let (records, read) = self
            .reader
            .read_records::<SongRecord>(&files, "song", SongRecord::from_json)
            .await?;

        let extractor = CatalogExtractor::new(self.sink.clone());
        let (_, tables) = task::spawn_blocking(move || extractor.extract(&records))
            .await
            .map_err(|e| EtlError::stage("catalog", e))??;

        Ok(CatalogOutcome { read, tables })
    }

    /// Read the activity log and persist `users` and `time`
    async fn process_log_data(&self) -> Result<EventOutcome> {
        let files = self.discovery.discover(&self.config.log_data_pattern)?;
        info!("Found {} log data files", files.len());

        let (records, read) = self
            .reader
            .read_records::<EventRecord>(&files, "log", EventRecord::from_json)
            .await?;

        let extractor = EventExtractor::new(self.sink.clone());
        let (events, tables) = task::spawn_blocking(move || extractor.extract(&records))
            .await
            .map_err(|e| EtlError::stage("events", e))??;

        Ok(EventOutcome {
            read,
            events,
            tables,
        })
    }
}
