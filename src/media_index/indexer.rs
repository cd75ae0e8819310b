//! Populates the media index from library folders.
//!
//! Each audio file found by [`scanner::scan`] gets an upserted row keyed by
//! path. Album names map to stable ids through `media_albums`, so every row
//! of an album shares one id across re-indexing. `date_added` is written
//! once and survives later passes; `date_modified` tracks the file mtime.

use futures::StreamExt;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::metadata::{self, BasicTags};
use crate::scanner;

/// Album and artist stored when a file carries no tag for them.
pub const UNKNOWN_TAG: &str = "<unknown>";

/// Files indexed in parallel.
const INDEX_CONCURRENCY: usize = 8;

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Rows inserted or refreshed
    pub indexed: usize,
    /// Files that could not be indexed
    pub failed: usize,
}

/// Cheap per-file facts gathered off the async runtime.
#[derive(Debug)]
struct FileFacts {
    path: PathBuf,
    tags: BasicTags,
    size: i64,
    modified: i64,
}

/// Walk every root and upsert an index row per audio file.
///
/// Unreadable files are logged and counted in [`IndexReport::failed`];
/// only a missing root is an error.
pub async fn index_library(
    pool: &SqlitePool,
    roots: &[PathBuf],
    follow_links: bool,
) -> Result<IndexReport> {
    let mut report = IndexReport::default();

    for root in roots {
        if !root.is_dir() {
            return Err(Error::not_found(root));
        }
        tracing::info!(target: "indexer", root = %root.display(), "Indexing library root");

        let results = scanner::scan(root.clone(), follow_links)
            .map(|path| {
                let pool = pool.clone();
                async move {
                    let outcome = index_file(&pool, path.clone()).await;
                    (path, outcome)
                }
            })
            .buffer_unordered(INDEX_CONCURRENCY);
        let mut results = std::pin::pin!(results);

        while let Some((path, outcome)) = results.next().await {
            match outcome {
                Ok(_) => report.indexed += 1,
                Err(e) => {
                    tracing::warn!(target: "indexer", path = %path.display(), error = %e, "Failed to index file");
                    report.failed += 1;
                }
            }
        }
    }

    tracing::info!(
        target: "indexer",
        indexed = report.indexed,
        failed = report.failed,
        "Indexing complete"
    );
    Ok(report)
}

/// Index a single file, returning its row id.
pub async fn index_file(pool: &SqlitePool, path: PathBuf) -> Result<i64> {
    let facts = tokio::task::spawn_blocking(move || gather_facts(path))
        .await
        .map_err(|e| Error::task(e.to_string()))??;

    let album = facts.tags.album.as_deref().unwrap_or(UNKNOWN_TAG);
    let album_id = get_or_create_album_id(pool, album).await?;
    let title = facts.tags.title.clone().unwrap_or_else(|| file_stem(&facts.path));
    let artist = facts.tags.artist.as_deref().unwrap_or(UNKNOWN_TAG);
    let path_str = facts.path.to_string_lossy().into_owned();

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO media_index (path, title, album, album_id, artist, size, date_added, date_modified, is_music)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            title = excluded.title,
            album = excluded.album,
            album_id = excluded.album_id,
            artist = excluded.artist,
            size = excluded.size,
            date_modified = excluded.date_modified,
            is_music = excluded.is_music
        RETURNING id
        "#,
    )
    .bind(&path_str)
    .bind(&title)
    .bind(album)
    .bind(album_id)
    .bind(artist)
    .bind(facts.size)
    .bind(chrono::Utc::now().timestamp())
    .bind(facts.modified)
    .bind(scanner::is_music_path(&facts.path))
    .fetch_one(pool)
    .await?;

    tracing::trace!(target: "indexer", path = %path_str, id, "Indexed");
    Ok(id)
}

/// Stable id for an album name.
pub async fn get_or_create_album_id(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    sqlx::query("INSERT INTO media_albums (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;
    let (id,): (i64,) = sqlx::query_as("SELECT id FROM media_albums WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Remove index rows whose file no longer exists.
///
/// Returns the number of rows removed.
pub async fn prune_missing(pool: &SqlitePool) -> sqlx::Result<usize> {
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, path FROM media_index")
        .fetch_all(pool)
        .await?;

    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for (id, path) in rows {
        if !Path::new(&path).exists() {
            sqlx::query("DELETE FROM media_index WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            removed += 1;
        }
    }
    tx.commit().await?;

    if removed > 0 {
        tracing::info!(target: "indexer", removed, "Pruned missing files from index");
    }
    Ok(removed)
}

fn gather_facts(path: PathBuf) -> Result<FileFacts> {
    let meta = std::fs::metadata(&path)?;
    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    // Untaggable files still get a row named after the file.
    let tags = match metadata::read_basic(&path) {
        Ok(tags) => tags,
        Err(e) => {
            tracing::debug!(target: "indexer", path = %path.display(), error = %e, "No readable tags");
            BasicTags::default()
        }
    };

    Ok(FileFacts {
        size: meta.len() as i64,
        modified,
        tags,
        path,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNKNOWN_TAG.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_index::{MediaIndex, Selection, SqliteMediaIndex};
    use crate::test_utils::{temp_db, write_wav};

    #[tokio::test]
    async fn test_index_library_creates_rows() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        write_wav(&music.path().join("one.wav"), 8_000, 1);
        write_wav(&music.path().join("two.wav"), 8_000, 1);
        std::fs::write(music.path().join("readme.txt"), "not audio").unwrap();

        let report = index_library(&pool, &[music.path().to_path_buf()], false)
            .await
            .unwrap();
        assert_eq!(report, IndexReport { indexed: 2, failed: 0 });

        let index = SqliteMediaIndex::new(pool);
        let rows = index.query(&Selection::music()).await.unwrap();
        assert_eq!(rows.len(), 2);
        let mut titles: Vec<_> = rows.iter().map(|r| r.title.clone()).collect();
        titles.sort();
        assert_eq!(titles, vec!["one", "two"]);
        assert!(rows.iter().all(|r| r.album == UNKNOWN_TAG));
        // Same album name, same id.
        assert_eq!(rows[0].album_id, rows[1].album_id);
    }

    #[tokio::test]
    async fn test_reindex_preserves_date_added() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let path = music.path().join("song.wav");
        write_wav(&path, 8_000, 1);

        let id = index_file(&pool, path.clone()).await.unwrap();
        sqlx::query("UPDATE media_index SET date_added = 42 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let again = index_file(&pool, path).await.unwrap();
        assert_eq!(id, again);
        let (date_added,): (i64,) = sqlx::query_as("SELECT date_added FROM media_index WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(date_added, 42);
    }

    #[tokio::test]
    async fn test_non_music_directories_are_flagged() {
        let (pool, _db_dir) = temp_db().await;
        let root = tempfile::tempdir().unwrap();
        let ringtones = root.path().join("Ringtones");
        std::fs::create_dir(&ringtones).unwrap();
        write_wav(&ringtones.join("beep.wav"), 8_000, 1);
        write_wav(&root.path().join("song.wav"), 8_000, 1);

        index_library(&pool, &[root.path().to_path_buf()], false)
            .await
            .unwrap();

        let index = SqliteMediaIndex::new(pool);
        assert_eq!(index.count().await.unwrap(), 2);
        let music = index.query(&Selection::music()).await.unwrap();
        assert_eq!(music.len(), 1);
        assert!(music[0].path.ends_with("song.wav"));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let (pool, _db_dir) = temp_db().await;
        let result = index_library(&pool, &[PathBuf::from("/definitely/not/here")], false).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prune_missing() {
        let (pool, _db_dir) = temp_db().await;
        let music = tempfile::tempdir().unwrap();
        let kept = music.path().join("kept.wav");
        let gone = music.path().join("gone.wav");
        write_wav(&kept, 8_000, 1);
        write_wav(&gone, 8_000, 1);
        index_library(&pool, &[music.path().to_path_buf()], false)
            .await
            .unwrap();

        std::fs::remove_file(&gone).unwrap();
        assert_eq!(prune_missing(&pool).await.unwrap(), 1);

        let index = SqliteMediaIndex::new(pool);
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
