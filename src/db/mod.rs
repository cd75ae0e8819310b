//! Database module for library and blacklist persistence.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. One database
//! file holds both the media index (see [`crate::media_index`]) and the
//! library store managed here:
//! - Songs and albums produced by the last scan
//! - Blacklisted songs and folders
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::db::{init_db, get_all_songs};
//!
//! let pool = init_db("sqlite:music.db").await?;
//! let songs = get_all_songs(&pool).await?;
//! ```

use std::collections::HashSet;

use crate::media_index::selection::escape_like;
use crate::model::{Album, BlacklistedFolder, BlacklistedSong, Song};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "music_indexer.db";

const SONG_COLUMNS: &str = "location, title, album, size_mb, added_date, modified_date, artist, \
     album_artist, composer, genre, lyricist, year, comment, duration_millis, duration_formatted, \
     bitrate, sample_rate, bits_per_sample, mime_type, favourite, art_uri";

/// Build a SQLite database URL from an optional path.
///
/// If no path is provided, uses [`DEFAULT_DB_NAME`] in the current directory.
pub fn db_url(path: Option<&std::path::Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(target: "db", url = db_url, "Database ready");
    Ok(pool)
}

// ============================================================================
// Songs & albums
// ============================================================================

/// Replace the stored library with the result of a scan.
///
/// Songs are upserted by location, keeping the `favourite` flag of songs
/// that were already stored. Stored songs missing from `songs` are removed.
/// Albums are replaced wholesale.
pub async fn replace_library(
    pool: &SqlitePool,
    songs: &[Song],
    albums: &[Album],
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    let existing: Vec<(String,)> = sqlx::query_as("SELECT location FROM songs")
        .fetch_all(&mut *tx)
        .await?;
    let scanned: HashSet<&str> = songs.iter().map(|s| s.location.as_str()).collect();
    let mut removed = 0usize;
    for (location,) in existing {
        if !scanned.contains(location.as_str()) {
            sqlx::query("DELETE FROM songs WHERE location = ?")
                .bind(&location)
                .execute(&mut *tx)
                .await?;
            removed += 1;
        }
    }

    let upsert = format!(
        r#"
        INSERT INTO songs ({SONG_COLUMNS})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(location) DO UPDATE SET
            title = excluded.title,
            album = excluded.album,
            size_mb = excluded.size_mb,
            added_date = excluded.added_date,
            modified_date = excluded.modified_date,
            artist = excluded.artist,
            album_artist = excluded.album_artist,
            composer = excluded.composer,
            genre = excluded.genre,
            lyricist = excluded.lyricist,
            year = excluded.year,
            comment = excluded.comment,
            duration_millis = excluded.duration_millis,
            duration_formatted = excluded.duration_formatted,
            bitrate = excluded.bitrate,
            sample_rate = excluded.sample_rate,
            bits_per_sample = excluded.bits_per_sample,
            mime_type = excluded.mime_type,
            art_uri = excluded.art_uri
        "#
    );
    for song in songs {
        sqlx::query(&upsert)
            .bind(&song.location)
            .bind(&song.title)
            .bind(&song.album)
            .bind(song.size_mb)
            .bind(&song.added_date)
            .bind(&song.modified_date)
            .bind(&song.artist)
            .bind(&song.album_artist)
            .bind(&song.composer)
            .bind(&song.genre)
            .bind(&song.lyricist)
            .bind(song.year)
            .bind(&song.comment)
            .bind(song.duration_millis)
            .bind(&song.duration_formatted)
            .bind(song.bitrate)
            .bind(song.sample_rate)
            .bind(song.bits_per_sample)
            .bind(&song.mime_type)
            .bind(song.favourite)
            .bind(&song.art_uri)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM albums").execute(&mut *tx).await?;
    for album in albums {
        sqlx::query("INSERT INTO albums (name, art_uri) VALUES (?, ?)")
            .bind(&album.name)
            .bind(&album.art_uri)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::debug!(
        target: "db",
        songs = songs.len(),
        albums = albums.len(),
        removed,
        "Library replaced"
    );
    Ok(())
}

/// All stored songs, ordered by title.
pub async fn get_all_songs(pool: &SqlitePool) -> sqlx::Result<Vec<Song>> {
    sqlx::query_as::<_, Song>(&format!(
        "SELECT {SONG_COLUMNS} FROM songs ORDER BY title COLLATE NOCASE"
    ))
    .fetch_all(pool)
    .await
}

/// A stored song by location.
pub async fn get_song(pool: &SqlitePool, location: &str) -> sqlx::Result<Option<Song>> {
    sqlx::query_as::<_, Song>(&format!("SELECT {SONG_COLUMNS} FROM songs WHERE location = ?"))
        .bind(location)
        .fetch_optional(pool)
        .await
}

/// All stored albums, ordered by name.
pub async fn get_all_albums(pool: &SqlitePool) -> sqlx::Result<Vec<Album>> {
    sqlx::query_as::<_, Album>("SELECT name, art_uri FROM albums ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Mark or unmark a song as favourite. Returns false if the song is unknown.
pub async fn set_favourite(pool: &SqlitePool, location: &str, favourite: bool) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE songs SET favourite = ? WHERE location = ?")
        .bind(favourite)
        .bind(location)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete stored songs by location. Returns the number removed.
pub async fn delete_songs(pool: &SqlitePool, locations: &[String]) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for location in locations {
        removed += sqlx::query("DELETE FROM songs WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(removed)
}

/// Delete stored songs whose location starts with `folder`.
pub async fn delete_songs_under(pool: &SqlitePool, folder: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM songs WHERE location LIKE ? ESCAPE '\\'")
        .bind(format!("{}%", escape_like(folder)))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Blacklists
// ============================================================================

/// Add songs to the blacklist. Already blacklisted entries are kept.
pub async fn insert_blacklisted_songs(
    pool: &SqlitePool,
    entries: &[BlacklistedSong],
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;
    for entry in entries {
        sqlx::query(
            "INSERT INTO blacklisted_songs (location, title, artist) VALUES (?, ?, ?) \
             ON CONFLICT(location) DO NOTHING",
        )
        .bind(&entry.location)
        .bind(&entry.title)
        .bind(&entry.artist)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await
}

/// Remove songs from the blacklist. Returns the number removed.
pub async fn delete_blacklisted_songs(pool: &SqlitePool, locations: &[String]) -> sqlx::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for location in locations {
        removed += sqlx::query("DELETE FROM blacklisted_songs WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(removed)
}

/// Blacklisted songs, ordered by title.
pub async fn get_blacklisted_songs(pool: &SqlitePool) -> sqlx::Result<Vec<BlacklistedSong>> {
    sqlx::query_as::<_, BlacklistedSong>(
        "SELECT location, title, artist FROM blacklisted_songs ORDER BY title COLLATE NOCASE",
    )
    .fetch_all(pool)
    .await
}

/// Add a folder to the blacklist. Returns false if it was already there.
pub async fn insert_blacklisted_folder(pool: &SqlitePool, path: &str) -> sqlx::Result<bool> {
    let result =
        sqlx::query("INSERT INTO blacklisted_folders (path) VALUES (?) ON CONFLICT(path) DO NOTHING")
            .bind(path)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a folder from the blacklist. Returns false if it was not there.
pub async fn delete_blacklisted_folder(pool: &SqlitePool, path: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM blacklisted_folders WHERE path = ?")
        .bind(path)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Blacklisted folders, ordered by path.
pub async fn get_blacklisted_folders(pool: &SqlitePool) -> sqlx::Result<Vec<BlacklistedFolder>> {
    sqlx::query_as::<_, BlacklistedFolder>("SELECT path FROM blacklisted_folders ORDER BY path")
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_song, temp_db};

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = db_url(Some(&db_path));

        let pool = init_db(&db_url).await.expect("Failed to init db");
        assert!(db_path.exists());

        let songs = get_all_songs(&pool).await.expect("Failed to query songs");
        assert!(songs.is_empty());
    }

    #[test]
    fn test_db_url_default() {
        assert_eq!(db_url(None), "sqlite:music_indexer.db");
    }

    #[tokio::test]
    async fn test_replace_library_roundtrip() {
        let (pool, _dir) = temp_db().await;
        let song = mock_song("/music/a.mp3");
        let album = Album::new("Test Album", "media://audio/albumart/1");

        replace_library(&pool, std::slice::from_ref(&song), std::slice::from_ref(&album))
            .await
            .unwrap();

        assert_eq!(get_all_songs(&pool).await.unwrap(), vec![song.clone()]);
        assert_eq!(get_all_albums(&pool).await.unwrap(), vec![album]);
        assert_eq!(get_song(&pool, "/music/a.mp3").await.unwrap(), Some(song));
        assert_eq!(get_song(&pool, "/music/b.mp3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_replace_library_drops_stale_and_keeps_favourites() {
        let (pool, _dir) = temp_db().await;
        let kept = mock_song("/music/kept.mp3");
        let stale = mock_song("/music/stale.mp3");
        replace_library(&pool, &[kept.clone(), stale], &[]).await.unwrap();
        assert!(set_favourite(&pool, "/music/kept.mp3", true).await.unwrap());

        let rescanned = Song {
            title: "Renamed".to_string(),
            ..kept
        };
        replace_library(&pool, &[rescanned], &[]).await.unwrap();

        let songs = get_all_songs(&pool).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Renamed");
        assert!(songs[0].favourite);
    }

    #[tokio::test]
    async fn test_delete_songs_under_folder() {
        let (pool, _dir) = temp_db().await;
        let songs = vec![
            mock_song("/music/hidden/a.mp3"),
            mock_song("/music/hidden/sub/b.mp3"),
            mock_song("/music/hidden_not/c.mp3"),
            mock_song("/music/kept/d.mp3"),
        ];
        replace_library(&pool, &songs, &[]).await.unwrap();

        // Trailing separator keeps "/music/hidden_not" out.
        let removed = delete_songs_under(&pool, "/music/hidden/").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(get_all_songs(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blacklisted_songs_crud() {
        let (pool, _dir) = temp_db().await;
        let entry = BlacklistedSong {
            location: "/music/a.mp3".to_string(),
            title: "A".to_string(),
            artist: "Someone".to_string(),
        };
        insert_blacklisted_songs(&pool, &[entry.clone(), entry.clone()])
            .await
            .unwrap();
        assert_eq!(get_blacklisted_songs(&pool).await.unwrap(), vec![entry]);

        let removed = delete_blacklisted_songs(&pool, &["/music/a.mp3".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(get_blacklisted_songs(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blacklisted_folders_crud() {
        let (pool, _dir) = temp_db().await;
        assert!(insert_blacklisted_folder(&pool, "/music/hidden").await.unwrap());
        assert!(!insert_blacklisted_folder(&pool, "/music/hidden").await.unwrap());
        assert_eq!(
            get_blacklisted_folders(&pool).await.unwrap(),
            vec![BlacklistedFolder {
                path: "/music/hidden".to_string()
            }]
        );
        assert!(delete_blacklisted_folder(&pool, "/music/hidden").await.unwrap());
        assert!(!delete_blacklisted_folder(&pool, "/music/hidden").await.unwrap());
    }
}
