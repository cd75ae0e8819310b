//! Test utilities and fixtures for music-indexer tests.
//!
//! This module provides common test helpers, in-memory collaborators for
//! the extraction pipeline, and database utilities to reduce boilerplate.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::test_utils::{temp_db, write_wav};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     write_wav(&dir.join("tone.wav"), 8_000, 1);
//!     // ... test logic
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::extractor::CrashReporter;
use crate::media_index::{IndexRow, MediaIndex, Selection};
use crate::metadata::{MetadataRetriever, RawMetadata};
use crate::model::{Song, song_art_uri};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically. Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Create an empty file (and its parent directories), returning its path.
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::File::create(path).expect("Failed to create file");
    path.to_path_buf()
}

/// Write a silent 16-bit mono PCM WAV file that lofty can parse.
pub fn write_wav(path: &Path, sample_rate: u32, seconds: u32) {
    let channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = byte_rate * seconds;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(path, bytes).expect("Failed to write wav");
}

/// An index row with sensible defaults.
///
/// `date_added` equals `id`, so rows come back in id order unless a test
/// overrides it.
pub fn mock_index_row(id: i64, path: &str, album: &str) -> IndexRow {
    IndexRow {
        id,
        path: path.to_string(),
        title: format!("Track {}", id),
        album: album.to_string(),
        album_id: id,
        artist: "Test Artist".to_string(),
        size: 1024,
        date_added: id,
        date_modified: id,
        is_music: true,
    }
}

/// Insert a row straight into the `media_index` table.
pub async fn insert_index_row(pool: &SqlitePool, path: &str, album: &str, date_added: i64) -> i64 {
    let album_id = crate::media_index::indexer::get_or_create_album_id(pool, album)
        .await
        .expect("Failed to create album");
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO media_index (path, title, album, album_id, artist, size, date_added, date_modified, is_music) \
         VALUES (?, ?, ?, ?, 'Test Artist', 1024, ?, ?, 1) RETURNING id",
    )
    .bind(path)
    .bind(Path::new(path).file_stem().map(|s| s.to_string_lossy().into_owned()))
    .bind(album)
    .bind(album_id)
    .bind(date_added)
    .bind(date_added)
    .fetch_one(pool)
    .await
    .expect("Failed to insert index row");
    id
}

/// A song with sensible defaults at `location`.
pub fn mock_song(location: &str) -> Song {
    Song {
        location: location.to_string(),
        title: "Test Track".to_string(),
        album: "Test Album".to_string(),
        size_mb: 3.5,
        added_date: "01 Jan 2024".to_string(),
        modified_date: "01 Jan 2024".to_string(),
        artist: "Test Artist".to_string(),
        album_artist: "Test Artist".to_string(),
        composer: "Unknown".to_string(),
        genre: "Rock".to_string(),
        lyricist: "Unknown".to_string(),
        year: 2024,
        comment: None,
        duration_millis: 180_000,
        duration_formatted: "3:00".to_string(),
        bitrate: 320_000.0,
        sample_rate: 44_100.0,
        bits_per_sample: 16,
        mime_type: Some("audio/mpeg".to_string()),
        favourite: false,
        art_uri: song_art_uri(1),
    }
}

/// In-memory [`MediaIndex`] evaluating selections in process.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    rows: Vec<IndexRow>,
    available: bool,
}

impl MemoryIndex {
    pub fn new(rows: Vec<IndexRow>) -> Self {
        Self {
            rows,
            available: true,
        }
    }

    /// An index whose every query fails.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaIndex for MemoryIndex {
    async fn query(&self, selection: &Selection) -> Option<Vec<IndexRow>> {
        if !self.available {
            return None;
        }
        let mut rows: Vec<IndexRow> = self
            .rows
            .iter()
            .filter(|row| selection.matches(row))
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date_added, row.id));
        Some(rows)
    }
}

/// [`MetadataRetriever`] answering from a script instead of files.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRetriever {
    responses: HashMap<String, RawMetadata>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedRetriever {
    /// Answer `raw` for `path`.
    pub fn respond(mut self, path: &str, raw: RawMetadata) -> Self {
        self.responses.insert(path.to_string(), raw);
        self
    }

    /// Fail every retrieval of `path`.
    pub fn failing(mut self, path: &str) -> Self {
        self.failures.insert(path.to_string());
        self
    }

    /// Panic while reading `path`.
    pub fn panicking(mut self, path: &str) -> Self {
        self.panics.insert(path.to_string());
        self
    }

    /// Block every read until `gate` hands out a permit or is closed.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl MetadataRetriever for ScriptedRetriever {
    fn retrieve(&self, path: &Path) -> Result<RawMetadata> {
        if let Some(gate) = &self.gate {
            // A closed gate lets every read through.
            let _permit = futures::executor::block_on(gate.acquire());
        }
        let key = path.to_string_lossy();
        if self.panics.contains(key.as_ref()) {
            panic!("scripted panic reading {}", key);
        }
        if self.failures.contains(key.as_ref()) {
            return Err(Error::metadata(path, "scripted failure"));
        }
        Ok(self.responses.get(key.as_ref()).cloned().unwrap_or_default())
    }
}

/// [`CrashReporter`] remembering which paths failed.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    paths: Mutex<Vec<PathBuf>>,
}

impl RecordingReporter {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }
}

impl CrashReporter for RecordingReporter {
    fn log_exception(&self, path: &Path, _error: &Error) {
        self.paths.lock().push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;
        let songs = crate::db::get_all_songs(&pool).await.unwrap();
        assert!(songs.is_empty());
    }

    #[test]
    fn test_write_wav_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 8_000, 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 44 + 32_000);
    }

    #[tokio::test]
    async fn test_memory_index_orders_and_filters() {
        let mut late = mock_index_row(1, "/m/a.mp3", "A");
        late.date_added = 50;
        let early = mock_index_row(2, "/m/b.mp3", "A");
        let index = MemoryIndex::new(vec![late, early]);

        let rows = index.query(&Selection::all()).await.unwrap();
        assert_eq!(rows[0].id, 2);
        assert_eq!(rows[1].id, 1);

        let rows = index.query(&Selection::exact_path("/m/a.mp3")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(MemoryIndex::unavailable().query(&Selection::all()).await.is_none());
    }

    #[test]
    fn test_scripted_retriever() {
        let retriever = ScriptedRetriever::default().failing("/bad.mp3");
        assert!(retriever.retrieve(Path::new("/bad.mp3")).is_err());
        assert_eq!(
            retriever.retrieve(Path::new("/good.mp3")).unwrap(),
            RawMetadata::default()
        );
    }
}
