//! Catalog extraction: song-metadata records into the `songs` and `artists`
//! dimensions.

use crate::error::Result;
use crate::models::{SongRecord, TableWriteStats};
use crate::processor::sink::PartitionedSink;
use crate::schema::{ARTISTS, SONGS};

use polars::prelude::*;
use tracing::debug;

/// Dimension frames built from the song catalog
#[derive(Debug, Clone)]
pub struct CatalogTables {
    pub songs: DataFrame,
    pub artists: DataFrame,
}

#[derive(Debug, Clone)]
pub struct CatalogExtractor {
    sink: PartitionedSink,
}

impl CatalogExtractor {
    pub fn new(sink: PartitionedSink) -> Self {
        Self { sink }
    }

    /// Build both dimensions and persist them, `songs` first
    pub fn extract(&self, records: &[SongRecord]) -> Result<(CatalogTables, Vec<TableWriteStats>)> {
        let tables = build_tables(records)?;
        let songs = self.sink.write_table(&SONGS, &tables.songs)?;
        let artists = self.sink.write_table(&ARTISTS, &tables.artists)?;
        Ok((tables, vec![songs, artists]))
    }
}

/// Project catalog records into `songs` and `artists`.
///
/// Fields were coerced when the records were read, so a bad `year` or
/// `duration` shows up here as a null in an otherwise complete row. Duplicate
/// catalog entries are kept.
pub fn build_tables(records: &[SongRecord]) -> Result<CatalogTables> {
    let catalog = catalog_frame(records)?;
    debug!("Building catalog dimensions from {} records", catalog.height());

    let songs = catalog
        .clone()
        .lazy()
        .select([
            col("song_id"),
            col("title"),
            col("artist_id"),
            col("year"),
            col("duration"),
        ])
        .collect()?;

    let artists = catalog
        .lazy()
        .select([
            col("artist_id"),
            col("artist_name").alias("name"),
            col("artist_location").alias("location"),
            col("artist_latitude").alias("latitude"),
            col("artist_longitude").alias("longitude"),
        ])
        .collect()?;

    Ok(CatalogTables { songs, artists })
}

fn catalog_frame(records: &[SongRecord]) -> Result<DataFrame> {
    let frame = df!(
        "song_id" => column(records, |r| r.song_id.clone()),
        "title" => column(records, |r| r.title.clone()),
        "artist_id" => column(records, |r| r.artist_id.clone()),
        "artist_name" => column(records, |r| r.artist_name.clone()),
        "artist_location" => column(records, |r| r.artist_location.clone()),
        "artist_latitude" => column(records, |r| r.artist_latitude),
        "artist_longitude" => column(records, |r| r.artist_longitude),
        "year" => column(records, |r| r.year),
        "duration" => column(records, |r| r.duration),
    )?;
    Ok(frame)
}

fn column<T>(records: &[SongRecord], field: impl Fn(&SongRecord) -> Option<T>) -> Vec<Option<T>> {
    records.iter().map(field).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgorithm;
    use tempfile::TempDir;

    fn song(song_id: &str, title: &str, artist_id: &str) -> SongRecord {
        SongRecord {
            song_id: Some(song_id.to_string()),
            title: Some(title.to_string()),
            artist_id: Some(artist_id.to_string()),
            artist_name: Some(format!("{} name", artist_id)),
            artist_location: None,
            artist_latitude: Some(35.1),
            artist_longitude: None,
            year: Some(2000),
            duration: Some(210.5),
        }
    }

    #[test]
    fn test_songs_projection() {
        let tables = build_tables(&[song("S1", "Test Song", "A1")]).unwrap();

        let names: Vec<&str> = tables
            .songs
            .get_column_names()
            .into_iter()
            .map(|n| n.as_str())
            .collect();
        assert_eq!(names, SONGS.column_names());
        assert_eq!(tables.songs.column("year").unwrap().dtype(), &DataType::Int32);
        assert_eq!(
            tables.songs.column("duration").unwrap().dtype(),
            &DataType::Float64
        );
    }

    #[test]
    fn test_artists_projection_renames() {
        let tables = build_tables(&[song("S1", "Test Song", "A1")]).unwrap();

        let names: Vec<&str> = tables
            .artists
            .get_column_names()
            .into_iter()
            .map(|n| n.as_str())
            .collect();
        assert_eq!(names, ARTISTS.column_names());
        let name = tables
            .artists
            .column("name")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .map(str::to_string);
        assert_eq!(name, Some("A1 name".to_string()));
    }

    #[test]
    fn test_uncastable_fields_keep_row() {
        let mut broken = song("S2", "Broken", "A2");
        broken.year = None;
        broken.duration = None;

        let tables = build_tables(&[song("S1", "Test Song", "A1"), broken]).unwrap();

        assert_eq!(tables.songs.height(), 2);
        assert_eq!(tables.songs.column("year").unwrap().null_count(), 1);
        assert_eq!(tables.songs.column("duration").unwrap().null_count(), 1);
    }

    #[test]
    fn test_duplicates_propagate() {
        let records = [song("S1", "Same", "A1"), song("S1", "Same", "A1")];

        let tables = build_tables(&records).unwrap();

        assert_eq!(tables.songs.height(), 2);
        assert_eq!(tables.artists.height(), 2);
    }

    #[test]
    fn test_extract_writes_both_tables() {
        let temp_dir = TempDir::new().unwrap();
        let sink = PartitionedSink::new(temp_dir.path().to_path_buf(), CompressionAlgorithm::Snappy);
        let extractor = CatalogExtractor::new(sink.clone());

        let (_, stats) = extractor
            .extract(&[song("S1", "Test Song", "A1"), song("S2", "Other", "A2")])
            .unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].table, "songs");
        assert_eq!(stats[0].partitions, 2);
        assert_eq!(stats[1].table, "artists");
        assert!(temp_dir.path().join("songs").join("year=2000").join("artist_id=A2").is_dir());
        assert_eq!(sink.read_table(&ARTISTS).unwrap().height(), 2);
    }

    #[test]
    fn test_empty_catalog() {
        let tables = build_tables(&[]).unwrap();

        assert_eq!(tables.songs.height(), 0);
        assert_eq!(tables.songs.width(), 5);
        assert_eq!(tables.artists.width(), 5);
    }
}
