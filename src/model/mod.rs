//! Core data models for the music library.
//!
//! Defines the entities produced by a scan: [`Song`], [`MiniSong`] and
//! [`Album`], plus the persisted blacklist entries. All of them derive
//! `FromRow` for the library store and `Serialize` for CLI output.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `songs` - Extracted audio files, keyed by location
//! - `albums` - One row per album name with a representative art URI
//! - `blacklisted_songs` / `blacklisted_folders` - Excluded paths

use serde::Serialize;
use sqlx::FromRow;

/// Scheme prefix for art URIs handed out by the media index.
pub const ART_URI_SCHEME: &str = "media://audio";

/// Art URI for a single indexed song.
pub fn song_art_uri(song_id: i64) -> String {
    format!("{}/{}/albumart", ART_URI_SCHEME, song_id)
}

/// Art URI for an indexed album.
pub fn album_art_uri(album_id: i64) -> String {
    format!("{}/albumart/{}", ART_URI_SCHEME, album_id)
}

/// One audio file's metadata.
///
/// Identity is the file location. Songs are created by extraction and
/// never mutated by the scan pipeline.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Song {
    /// Absolute file path (unique identifier)
    pub location: String,
    pub title: String,
    pub album: String,
    /// File size in megabytes
    pub size_mb: f32,
    /// Date the file entered the media index (`dd Mon yyyy`)
    pub added_date: String,
    /// File modification date (`dd Mon yyyy`)
    pub modified_date: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub lyricist: String,
    /// Release year, 0 when unknown
    pub year: i32,
    pub comment: Option<String>,
    pub duration_millis: i64,
    /// `m:ss` or `h:mm:ss`
    pub duration_formatted: String,
    /// Bits per second, 0 when unknown
    pub bitrate: f32,
    /// Hz, 0 when unknown
    pub sample_rate: f32,
    pub bits_per_sample: i32,
    pub mime_type: Option<String>,
    pub favourite: bool,
    pub art_uri: String,
}

/// Reduced song projection for lightweight listings.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct MiniSong {
    pub location: String,
    pub title: String,
    pub artist: String,
    pub art_uri: String,
}

/// An album with one representative art URI.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Album {
    /// Album name (unique)
    pub name: String,
    pub art_uri: String,
}

impl Album {
    pub fn new(name: impl Into<String>, art_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            art_uri: art_uri.into(),
        }
    }
}

/// A song hidden from the library.
///
/// Title and artist are kept so the restore list can show something
/// readable after the song has left the `songs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct BlacklistedSong {
    pub location: String,
    pub title: String,
    pub artist: String,
}

impl From<&Song> for BlacklistedSong {
    fn from(song: &Song) -> Self {
        Self {
            location: song.location.clone(),
            title: song.title.clone(),
            artist: song.artist.clone(),
        }
    }
}

/// A folder whose contents are hidden from the library.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct BlacklistedFolder {
    /// Folder path, matched as a prefix
    pub path: String,
}
