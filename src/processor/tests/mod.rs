//! Integration tests for the processor module
//!
//! Runs the complete pipeline against small raw datasets laid out like the
//! public song and log data.


use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Catalog entry used by the end-to-end scenarios
pub const TEST_SONG: &str = r#"{"song_id":"S1","title":"Test Song","artist_id":"A1","artist_name":"Test Artist","artist_location":"NY","artist_latitude":null,"artist_longitude":null,"year":2000,"duration":"210.5"}"#;

/// Song-play event that matches [`TEST_SONG`]
pub const MATCHING_PLAY: &str = r#"{"page":"NextSong","userId":"10","firstName":"Ann","lastName":"Lee","gender":"F","song":"Test Song","ts":1541440000000,"level":"free","sessionId":1,"location":"NY","userAgent":"X"}"#;

/// Helper to lay out a raw input tree: one song file per entry under
/// `song_data/A/B/C/`, and all log lines in one file under `log_data/2018/11/`
pub fn create_dataset(temp_dir: &TempDir, songs: &[&str], log_lines: &[&str]) -> (PathBuf, PathBuf) {
    let input = temp_dir.path().join("input");
    let song_dir = input.join("song_data").join("A").join("B").join("C");
    let log_dir = input.join("log_data").join("2018").join("11");
    fs::create_dir_all(&song_dir).unwrap();
    fs::create_dir_all(&log_dir).unwrap();

    for (i, song) in songs.iter().enumerate() {
        fs::write(song_dir.join(format!("TRABC{:04}.json", i)), song).unwrap();
    }
    fs::write(log_dir.join("2018-11-05-events.json"), log_lines.join("\n")).unwrap();

    let output = temp_dir.path().join("lake");
    (input, output)
}

/// Relative paths of every Parquet file below `root`, sorted
pub fn parquet_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "parquet"))
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
