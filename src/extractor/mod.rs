//! The music-library extraction pipeline.
//!
//! A scan queries the [`MediaIndex`] for candidate rows, drops rows whose
//! file is gone or blacklisted, records a representative album id per album
//! name, then fans out one extraction task per surviving row. Each task opens
//! the file through a [`MetadataRetriever`] and builds a [`Song`], falling
//! back to defaults for absent or malformed tags. Tasks are joined once all
//! of them finish; failed ones are dropped and reported to the
//! [`CrashReporter`].
//!
//! # Concurrency
//!
//! Tasks run on the runtime whose [`Handle`] the caller supplies. Fan-out is
//! bounded by a semaphore and the blocking metadata read runs on the
//! runtime's blocking pool. Nothing is delivered before the join, so one
//! slow file delays the whole result.
//!
//! # Example
//!
//! ```ignore
//! let extractor = SongExtractor::new(
//!     Handle::current(),
//!     SqliteMediaIndex::new(pool),
//!     LoftyRetriever,
//!     Arc::new(TracingCrashReporter),
//!     ExtractorOptions::default(),
//! );
//! let (songs, albums) = extractor
//!     .extract_filtered(&blacklisted_songs, &blacklisted_folders, None)
//!     .await;
//! ```

pub mod fields;
pub mod progress;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::media_index::{IndexRow, MediaIndex, Selection};
use crate::metadata::{MetadataKey, MetadataRetriever, RawMetadata};
use crate::model::{Album, MiniSong, Song, album_art_uri, song_art_uri};

pub use fields::UNKNOWN;
pub use progress::{Progress, ProgressCallback};

use fields::{
    bytes_to_mb, float_or_zero, format_date, format_duration, int_or_zero, text_or_unknown,
    year_or_zero,
};

/// Sink for unexpected per-file extraction failures.
pub trait CrashReporter: Send + Sync + 'static {
    fn log_exception(&self, path: &Path, error: &Error);
}

/// Reports extraction failures through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCrashReporter;

impl CrashReporter for TracingCrashReporter {
    fn log_exception(&self, path: &Path, error: &Error) {
        tracing::error!(target: "extractor", path = %path.display(), error = %error, "Metadata extraction failed");
    }
}

/// Tuning for a [`SongExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorOptions {
    /// Upper bound on extraction tasks reading files at once
    pub max_concurrent: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self { max_concurrent: 16 }
    }
}

impl From<&ScanConfig> for ExtractorOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_extractions.max(1),
        }
    }
}

/// Row fields carried into an extraction task.
#[derive(Debug, Clone)]
struct Candidate {
    song_id: i64,
    path: String,
    title: String,
    album: String,
    size: i64,
    date_added: i64,
    date_modified: i64,
}

impl From<IndexRow> for Candidate {
    fn from(row: IndexRow) -> Self {
        Self {
            song_id: row.id,
            title: row.title.trim().to_string(),
            album: row.album.trim().to_string(),
            path: row.path,
            size: row.size,
            date_added: row.date_added,
            date_modified: row.date_modified,
        }
    }
}

impl Candidate {
    fn into_song(self, raw: &RawMetadata) -> Song {
        let duration_millis = int_or_zero(raw.get(MetadataKey::Duration));
        Song {
            art_uri: song_art_uri(self.song_id),
            location: self.path,
            title: self.title,
            album: self.album,
            size_mb: bytes_to_mb(self.size),
            added_date: format_date(self.date_added),
            modified_date: format_date(self.date_modified),
            artist: text_or_unknown(raw.get(MetadataKey::Artist)),
            album_artist: text_or_unknown(raw.get(MetadataKey::AlbumArtist)),
            composer: text_or_unknown(raw.get(MetadataKey::Composer)),
            genre: text_or_unknown(raw.get(MetadataKey::Genre)),
            lyricist: text_or_unknown(raw.get(MetadataKey::Writer)),
            year: year_or_zero(raw.get(MetadataKey::Year)),
            comment: None,
            duration_millis,
            duration_formatted: format_duration(duration_millis),
            bitrate: float_or_zero(raw.get(MetadataKey::Bitrate)),
            sample_rate: float_or_zero(raw.get(MetadataKey::SampleRate)),
            bits_per_sample: i32::try_from(int_or_zero(raw.get(MetadataKey::BitsPerSample)))
                .unwrap_or(0),
            mime_type: raw.get(MetadataKey::MimeType).map(str::to_string),
            favourite: false,
        }
    }
}

/// Builds songs and albums from the media index.
pub struct SongExtractor<I, R> {
    runtime: Handle,
    index: Arc<I>,
    retriever: Arc<R>,
    reporter: Arc<dyn CrashReporter>,
    limiter: Arc<Semaphore>,
}

impl<I: MediaIndex, R: MetadataRetriever> SongExtractor<I, R> {
    pub fn new(
        runtime: Handle,
        index: I,
        retriever: R,
        reporter: Arc<dyn CrashReporter>,
        options: ExtractorOptions,
    ) -> Self {
        Self {
            runtime,
            index: Arc::new(index),
            retriever: Arc::new(retriever),
            reporter,
            limiter: Arc::new(Semaphore::new(options.max_concurrent.max(1))),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Look up and extract a single song by its exact path.
    ///
    /// `None` if the path is not indexed, the file is gone, or extraction
    /// fails.
    pub async fn resolve_song(&self, location: &str) -> Option<Song> {
        let row = self
            .index
            .query(&Selection::exact_path(location))
            .await?
            .into_iter()
            .find(|row| row.path == location)?;
        if !Path::new(&row.path).exists() {
            tracing::debug!(target: "extractor", path = %row.path, "Resolved row has no file");
            return None;
        }
        self.spawn_extraction(row.into(), None).await.ok().flatten()
    }

    /// Extract songs, optionally limited to files directly inside `folder`.
    pub async fn extract(&self, folder: Option<&Path>) -> Vec<Song> {
        let handles: Vec<_> = self
            .folder_rows(folder)
            .await
            .into_iter()
            .map(|row| self.spawn_extraction(row.into(), None))
            .collect();
        join_songs(handles).await
    }

    /// Reduced projection of [`extract`](Self::extract) without file reads.
    pub async fn extract_mini(&self, folder: Option<&Path>) -> Vec<MiniSong> {
        self.folder_rows(folder)
            .await
            .into_iter()
            .map(|row| MiniSong {
                art_uri: song_art_uri(row.id),
                title: row.title.trim().to_string(),
                location: row.path,
                artist: row.artist,
            })
            .collect()
    }

    /// Full library scan.
    ///
    /// Queries music rows outside `blacklisted_folders`, skips paths in
    /// `blacklisted_songs` and rows whose file is missing, and extracts the
    /// rest concurrently. `on_progress` receives `(parsed, total)` after
    /// every finished task, where `total` is the number of tasks started.
    ///
    /// Albums come back sorted by name, one per distinct album among the
    /// kept rows, each with the art of the last such row in index order.
    pub async fn extract_filtered(
        &self,
        blacklisted_songs: &HashSet<String>,
        blacklisted_folders: &HashSet<String>,
        on_progress: Option<ProgressCallback>,
    ) -> (Vec<Song>, Vec<Album>) {
        let selection = Selection::music().excluding_folders(blacklisted_folders.iter().cloned());
        let Some(rows) = self.index.query(&selection).await else {
            return (Vec::new(), Vec::new());
        };
        let candidate_rows = rows.len();

        let mut album_art: BTreeMap<String, i64> = BTreeMap::new();
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            if !Path::new(&row.path).exists() {
                tracing::debug!(target: "extractor", path = %row.path, "Skipping row without file");
                continue;
            }
            if blacklisted_songs.contains(&row.path) {
                continue;
            }
            let album_id = row.album_id;
            let candidate = Candidate::from(row);
            album_art.insert(candidate.album.clone(), album_id);
            candidates.push(candidate);
        }

        let progress = Arc::new(Progress::new(candidates.len(), on_progress));
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|candidate| self.spawn_extraction(candidate, Some(Arc::clone(&progress))))
            .collect();
        let songs = join_songs(handles).await;

        let albums: Vec<Album> = album_art
            .into_iter()
            .map(|(name, album_id)| Album::new(name, album_art_uri(album_id)))
            .collect();

        tracing::info!(
            target: "extractor",
            candidates = candidate_rows,
            extracted = songs.len(),
            failed = progress.total() - songs.len(),
            albums = albums.len(),
            "Scan finished"
        );
        (songs, albums)
    }

    /// Existing rows under `folder` whose parent directory is `folder`.
    async fn folder_rows(&self, folder: Option<&Path>) -> Vec<IndexRow> {
        let selection = match folder {
            Some(folder) => Selection::under_folder(folder.to_string_lossy()),
            None => Selection::all(),
        };
        let Some(rows) = self.index.query(&selection).await else {
            return Vec::new();
        };
        rows.into_iter()
            .filter(|row| {
                let path = Path::new(&row.path);
                path.exists() && folder.is_none_or(|folder| path.parent() == Some(folder))
            })
            .collect()
    }

    fn spawn_extraction(
        &self,
        candidate: Candidate,
        progress: Option<Arc<Progress>>,
    ) -> JoinHandle<Option<Song>> {
        let runtime = self.runtime.clone();
        let retriever = Arc::clone(&self.retriever);
        let reporter = Arc::clone(&self.reporter);
        let limiter = Arc::clone(&self.limiter);

        self.runtime.spawn(async move {
            let path = candidate.path.clone();
            let song = match limiter.acquire_owned().await {
                Ok(_permit) => {
                    let read = runtime
                        .spawn_blocking(move || read_song(retriever.as_ref(), candidate))
                        .await
                        .unwrap_or_else(|e| Err(Error::task(e.to_string())));
                    match read {
                        Ok(song) => Some(song),
                        Err(e) => {
                            reporter.log_exception(Path::new(&path), &e);
                            None
                        }
                    }
                }
                // Semaphore closed: the extractor is shutting down.
                Err(_) => None,
            };
            if let Some(progress) = progress {
                progress.complete_one();
            }
            song
        })
    }
}

fn read_song<R: MetadataRetriever>(retriever: &R, candidate: Candidate) -> Result<Song> {
    let raw = retriever.retrieve(Path::new(&candidate.path))?;
    Ok(candidate.into_song(&raw))
}

/// Join in spawn order, dropping failures.
async fn join_songs(handles: Vec<JoinHandle<Option<Song>>>) -> Vec<Song> {
    futures::future::join_all(handles)
        .await
        .into_iter()
        .filter_map(|joined| match joined {
            Ok(song) => song,
            Err(e) => {
                tracing::warn!(target: "extractor", error = %e, "Extraction task aborted");
                None
            }
        })
        .collect()
}
