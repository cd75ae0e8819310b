//! Filesystem discovery of audio files.
//!
//! Feeds the media indexer. Traversal is synchronous (walkdir) so it runs on
//! a blocking thread and hands paths over a bounded channel.

use futures::stream::Stream;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Extensions treated as audio (compared case-insensitively).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac", "aiff"];

/// Directory names whose audio is indexed but not flagged as music.
const NON_MUSIC_DIRS: &[&str] = &["ringtones", "notifications", "alarms", "podcasts"];

/// Whether the path has a supported audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Whether an audio file counts as music rather than a system sound.
///
/// Anything below a `Ringtones`, `Notifications`, `Alarms` or `Podcasts`
/// directory is not music.
pub fn is_music_path(path: &Path) -> bool {
    !path
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .filter_map(|c| c.as_os_str().to_str())
        .any(|name| NON_MUSIC_DIRS.contains(&name.to_lowercase().as_str()))
}

/// Scans the given root directory recursively for audio files.
///
/// Returns a Stream of PathBufs.
pub fn scan(root: PathBuf, follow_links: bool) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(&root)
            .follow_links(follow_links)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                // Receiver dropped: stop walking.
                if tx.blocking_send(entry.path().to_path_buf()).is_err() {
                    break;
                }
            }
        }
        tracing::debug!(target: "scanner", root = %root.display(), "Traversal finished");
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}
