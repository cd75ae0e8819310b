//! Library service: scans, blacklists and the stored library.
//!
//! [`Library`] ties the [`SongExtractor`] to the database. A scan loads the
//! blacklists, runs the extractor, and replaces the stored songs and albums.
//! Scan progress is published on a `watch` channel so any number of
//! observers can follow it.

pub mod restore;

use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use crate::db;
use crate::error::{Error, Result, ResultExt};
use crate::extractor::{ProgressCallback, SongExtractor};
use crate::media_index::MediaIndex;
use crate::metadata::MetadataRetriever;
use crate::model::{BlacklistedFolder, BlacklistedSong, Song};

pub use restore::{RestoreSession, RestoreState};

/// Published state of the library scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    NotRunning,
    InProgress { parsed: usize, total: usize },
    Complete,
}

/// What a finished scan stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub songs: usize,
    pub albums: usize,
}

/// Resets the scanning flag when a scan ends, successfully or not.
///
/// A scan future dropped mid-flight never reaches its final status update,
/// so an `InProgress` status left behind is reset to `NotRunning` here.
struct ScanGuard<'a> {
    scanning: &'a AtomicBool,
    status: &'a watch::Sender<ScanStatus>,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            let abandoned = matches!(status, ScanStatus::InProgress { .. });
            if abandoned {
                *status = ScanStatus::NotRunning;
            }
            abandoned
        });
        self.scanning.store(false, Ordering::SeqCst);
    }
}

pub struct Library<I, R> {
    pool: SqlitePool,
    extractor: Arc<SongExtractor<I, R>>,
    status: Arc<watch::Sender<ScanStatus>>,
    scanning: AtomicBool,
}

impl<I: MediaIndex, R: MetadataRetriever> Library<I, R> {
    pub fn new(pool: SqlitePool, extractor: SongExtractor<I, R>) -> Self {
        let (status, _) = watch::channel(ScanStatus::NotRunning);
        Self {
            pool,
            extractor: Arc::new(extractor),
            status: Arc::new(status),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn extractor(&self) -> &SongExtractor<I, R> {
        &self.extractor
    }

    /// Follow scan progress.
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ScanStatus {
        *self.status.borrow()
    }

    /// Scan the media index and replace the stored library.
    ///
    /// Fails with [`Error::ScanInProgress`] if another scan is running.
    pub async fn scan_for_music(&self) -> Result<ScanSummary> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }
        let _guard = ScanGuard {
            scanning: &self.scanning,
            status: &self.status,
        };

        let result = self.run_scan().await;
        match &result {
            Ok(summary) => {
                self.status.send_replace(ScanStatus::Complete);
                tracing::info!(target: "library", songs = summary.songs, albums = summary.albums, "Library scan complete");
            }
            Err(e) => {
                self.status.send_replace(ScanStatus::NotRunning);
                tracing::error!(target: "library", error = %e, "Library scan failed");
            }
        }
        result
    }

    async fn run_scan(&self) -> Result<ScanSummary> {
        let blacklisted_songs: HashSet<String> = db::get_blacklisted_songs(&self.pool)
            .await
            .with_context("Failed to load blacklisted songs")?
            .into_iter()
            .map(|entry| entry.location)
            .collect();
        let blacklisted_folders: HashSet<String> = db::get_blacklisted_folders(&self.pool)
            .await
            .with_context("Failed to load blacklisted folders")?
            .into_iter()
            .map(|entry| entry.path)
            .collect();

        self.status
            .send_replace(ScanStatus::InProgress { parsed: 0, total: 0 });
        let status = Arc::clone(&self.status);
        // Reads of an abandoned scan finish detached; they must not revive it.
        let on_progress: ProgressCallback = Arc::new(move |parsed, total| {
            status.send_if_modified(|current| {
                let live = matches!(current, ScanStatus::InProgress { .. });
                if live {
                    *current = ScanStatus::InProgress { parsed, total };
                }
                live
            });
        });

        let (songs, albums) = self
            .extractor
            .extract_filtered(&blacklisted_songs, &blacklisted_folders, Some(on_progress))
            .await;

        db::replace_library(&self.pool, &songs, &albums)
            .await
            .with_context("Failed to store scanned library")?;

        Ok(ScanSummary {
            songs: songs.len(),
            albums: albums.len(),
        })
    }

    /// Blacklist songs and drop them from the stored library.
    pub async fn blacklist_songs(&self, songs: &[Song]) -> Result<()> {
        let entries: Vec<BlacklistedSong> = songs.iter().map(BlacklistedSong::from).collect();
        db::insert_blacklisted_songs(&self.pool, &entries).await?;
        let locations: Vec<String> = songs.iter().map(|s| s.location.clone()).collect();
        let removed = db::delete_songs(&self.pool, &locations).await?;
        tracing::info!(target: "library", blacklisted = entries.len(), removed, "Blacklisted songs");
        Ok(())
    }

    /// Blacklist a folder and drop stored songs under it.
    ///
    /// Returns false if the folder was already blacklisted.
    pub async fn blacklist_folder(&self, path: &str) -> Result<bool> {
        let added = db::insert_blacklisted_folder(&self.pool, path).await?;
        let removed = db::delete_songs_under(&self.pool, path).await?;
        tracing::info!(target: "library", path, removed, "Blacklisted folder");
        Ok(added)
    }

    /// Take songs off the blacklist. They come back with the next scan.
    pub async fn whitelist_songs(&self, locations: &[String]) -> Result<u64> {
        Ok(db::delete_blacklisted_songs(&self.pool, locations).await?)
    }

    /// Take a folder off the blacklist. Returns false if it was not there.
    pub async fn whitelist_folder(&self, path: &str) -> Result<bool> {
        Ok(db::delete_blacklisted_folder(&self.pool, path).await?)
    }

    pub async fn blacklisted_songs(&self) -> Result<Vec<BlacklistedSong>> {
        Ok(db::get_blacklisted_songs(&self.pool).await?)
    }

    pub async fn blacklisted_folders(&self) -> Result<Vec<BlacklistedFolder>> {
        Ok(db::get_blacklisted_folders(&self.pool).await?)
    }

    /// Start a restore over the current blacklist.
    pub async fn restore_session(&self) -> Result<RestoreSession> {
        let entries = self.blacklisted_songs().await?;
        Ok(RestoreSession::new(self.pool.clone(), entries))
    }
}
