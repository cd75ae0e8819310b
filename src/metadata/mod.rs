//! Per-file audio metadata retrieval.
//!
//! Uses the lofty crate for format-independent access to tags and stream
//! properties. A retriever returns the raw string value of each
//! [`MetadataKey`] it found; parsing and fallbacks (a year of
//! `"2004-05-01"`, a bitrate of `"n/a"`) happen in the extractor.

use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Keys a retriever can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Milliseconds
    Duration,
    /// Hz
    SampleRate,
    BitsPerSample,
    /// Bits per second
    Bitrate,
    Artist,
    AlbumArtist,
    Composer,
    Genre,
    /// Lyricist / writer credit
    Writer,
    Year,
    MimeType,
}

/// Raw tag values for one file, keyed by [`MetadataKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetadata {
    values: HashMap<MetadataKey, String>,
}

impl RawMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value for `key`, if the file carried one.
    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn insert(&mut self, key: MetadataKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: MetadataKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    fn insert_opt(&mut self, key: MetadataKey, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }
}

/// Opens a file and reads its metadata.
///
/// Implementations are called from blocking worker threads.
pub trait MetadataRetriever: Send + Sync + 'static {
    fn retrieve(&self, path: &Path) -> Result<RawMetadata>;
}

/// Lofty-backed retriever used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyRetriever;

impl MetadataRetriever for LoftyRetriever {
    fn retrieve(&self, path: &Path) -> Result<RawMetadata> {
        let tagged_file = probe(path)?;
        let properties = tagged_file.properties();

        let mut raw = RawMetadata::new();
        raw.insert(
            MetadataKey::Duration,
            properties.duration().as_millis().to_string(),
        );
        raw.insert_opt(
            MetadataKey::SampleRate,
            properties.sample_rate().map(|v| v.to_string()),
        );
        raw.insert_opt(
            MetadataKey::BitsPerSample,
            properties.bit_depth().map(|v| v.to_string()),
        );
        raw.insert_opt(
            MetadataKey::Bitrate,
            properties
                .audio_bitrate()
                .or_else(|| properties.overall_bitrate())
                .map(|kbps| (u64::from(kbps) * 1000).to_string()),
        );
        raw.insert_opt(MetadataKey::MimeType, mime_type(tagged_file.file_type()));

        if let Some(tag) = primary_tag(&tagged_file) {
            raw.insert_opt(MetadataKey::Artist, tag.artist());
            raw.insert_opt(MetadataKey::Genre, tag.genre());
            raw.insert_opt(MetadataKey::AlbumArtist, tag.get_string(&ItemKey::AlbumArtist));
            raw.insert_opt(MetadataKey::Composer, tag.get_string(&ItemKey::Composer));
            raw.insert_opt(
                MetadataKey::Writer,
                tag.get_string(&ItemKey::Writer)
                    .or_else(|| tag.get_string(&ItemKey::Lyricist)),
            );
            raw.insert_opt(
                MetadataKey::Year,
                tag.get_string(&ItemKey::Year)
                    .or_else(|| tag.get_string(&ItemKey::RecordingDate)),
            );
        }

        Ok(raw)
    }
}

/// The few tags the media index stores per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicTags {
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
}

/// Read title, album and artist for indexing.
///
/// Files that lofty can open but that carry no tag yield empty
/// [`BasicTags`]; files it cannot parse are an error.
pub fn read_basic(path: &Path) -> Result<BasicTags> {
    let tagged_file = probe(path)?;
    let Some(tag) = primary_tag(&tagged_file) else {
        return Ok(BasicTags::default());
    };

    let text = |value: Option<std::borrow::Cow<'_, str>>| {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Ok(BasicTags {
        title: text(tag.title()),
        album: text(tag.album()),
        artist: text(tag.artist()),
    })
}

fn probe(path: &Path) -> Result<TaggedFile> {
    Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read metadata: {e}")))
}

/// The primary tag, or fall back to the first available one.
fn primary_tag(tagged_file: &TaggedFile) -> Option<&Tag> {
    tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
}

fn mime_type(file_type: FileType) -> Option<&'static str> {
    let mime = match file_type {
        FileType::Mpeg => "audio/mpeg",
        FileType::Flac => "audio/flac",
        FileType::Vorbis | FileType::Speex => "audio/ogg",
        FileType::Opus => "audio/opus",
        FileType::Wav => "audio/x-wav",
        FileType::Mp4 => "audio/mp4",
        FileType::Aac => "audio/aac",
        FileType::Aiff => "audio/aiff",
        FileType::Ape => "audio/ape",
        FileType::WavPack => "audio/wavpack",
        _ => return None,
    };
    Some(mime)
}
