//! Star-schema table definitions.
//!
//! Declares the five output tables, their typed columns and their partition
//! keys. The sink validates frames against these declarations before writing
//! and uses them to type partition columns on read.

use polars::prelude::{DataFrame, DataType, PlSmallStr, Schema};

use self::ColumnKind::{Float64, Int32, Int64, String as Text};

/// Activity-log `page` value marking a song play
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Declared type of an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int32,
    Int64,
    Float64,
    String,
}

impl ColumnKind {
    pub fn dtype(&self) -> DataType {
        match self {
            ColumnKind::Int32 => DataType::Int32,
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
            ColumnKind::String => DataType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn column(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind }
}

/// Output table declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    /// Full column order, partition keys included
    pub columns: &'static [ColumnDef],
    /// Ordered partition keys; empty for flat tables
    pub partition_by: &'static [&'static str],
}

impl TableSpec {
    pub fn is_partitioned(&self) -> bool {
        !self.partition_by.is_empty()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn partition_columns(&self) -> Vec<&'static str> {
        self.partition_by.to_vec()
    }

    pub fn is_partition_column(&self, column: &str) -> bool {
        self.partition_by.contains(&column)
    }

    /// Declared type of `column`, if the table has it
    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == column).map(|c| c.kind)
    }

    /// Schema of every column in declared order
    pub fn schema(&self) -> Schema {
        self.columns
            .iter()
            .map(|c| (PlSmallStr::from_static(c.name), c.kind.dtype()))
            .collect()
    }

    /// Schema of the partition keys, in partitioning order
    pub fn partition_schema(&self) -> Schema {
        self.partition_by
            .iter()
            .filter_map(|&name| {
                self.kind_of(name)
                    .map(|kind| (PlSmallStr::from_static(name), kind.dtype()))
            })
            .collect()
    }

    /// Zero-row frame carrying the full table schema
    pub fn empty_frame(&self) -> DataFrame {
        DataFrame::empty_with_schema(&self.schema())
    }
}

pub const SONGS: TableSpec = TableSpec {
    name: "songs",
    columns: &[
        column("song_id", Text),
        column("title", Text),
        column("artist_id", Text),
        column("year", Int32),
        column("duration", Float64),
    ],
    partition_by: &["year", "artist_id"],
};

pub const ARTISTS: TableSpec = TableSpec {
    name: "artists",
    columns: &[
        column("artist_id", Text),
        column("name", Text),
        column("location", Text),
        column("latitude", Float64),
        column("longitude", Float64),
    ],
    partition_by: &[],
};

pub const USERS: TableSpec = TableSpec {
    name: "users",
    columns: &[
        column("user_id", Int32),
        column("first_name", Text),
        column("last_name", Text),
        column("gender", Text),
        column("level", Text),
    ],
    partition_by: &[],
};

pub const TIME: TableSpec = TableSpec {
    name: "time",
    columns: &[
        column("start_time", Float64),
        column("hour", Int32),
        column("day", Int32),
        column("week", Int32),
        column("month", Int32),
        column("year", Int32),
    ],
    partition_by: &["year", "month"],
};

pub const SONGPLAYS: TableSpec = TableSpec {
    name: "songplays",
    columns: &[
        column("songplay_id", Int64),
        column("start_time", Float64),
        column("user_id", Int32),
        column("level", Text),
        column("song_id", Text),
        column("artist_id", Text),
        column("session_id", Int64),
        column("location", Text),
        column("user_agent", Text),
        column("year", Int32),
        column("month", Int32),
    ],
    partition_by: &["year", "month"],
};

/// All output tables in write order
pub const ALL_TABLES: [TableSpec; 5] = [SONGS, ARTISTS, USERS, TIME, SONGPLAYS];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keys_are_declared_columns() {
        for table in ALL_TABLES {
            for key in table.partition_by {
                assert!(
                    table.kind_of(key).is_some(),
                    "{} partition key {} missing from columns",
                    table.name,
                    key
                );
            }
        }
    }

    #[test]
    fn test_partitioning_layout() {
        assert_eq!(SONGS.partition_columns(), vec!["year", "artist_id"]);
        assert_eq!(TIME.partition_columns(), vec!["year", "month"]);
        assert_eq!(SONGPLAYS.partition_columns(), vec!["year", "month"]);
        assert!(!ARTISTS.is_partitioned());
        assert!(!USERS.is_partitioned());
        assert!(SONGS.is_partition_column("artist_id"));
        assert!(!SONGS.is_partition_column("title"));
    }

    #[test]
    fn test_partition_schema_follows_key_order() {
        let schema = SONGS.partition_schema();
        let fields: Vec<(&str, &DataType)> =
            schema.iter().map(|(name, dtype)| (name.as_str(), dtype)).collect();

        assert_eq!(
            fields,
            vec![("year", &DataType::Int32), ("artist_id", &DataType::String)]
        );
        assert!(USERS.partition_schema().is_empty());
    }

    #[test]
    fn test_empty_frame_is_typed() {
        let frame = SONGPLAYS.empty_frame();

        assert_eq!(frame.height(), 0);
        assert_eq!(frame.width(), SONGPLAYS.columns.len());
        assert_eq!(frame.column("songplay_id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(frame.column("start_time").unwrap().dtype(), &DataType::Float64);
        assert_eq!(frame.column("month").unwrap().dtype(), &DataType::Int32);
    }
}
