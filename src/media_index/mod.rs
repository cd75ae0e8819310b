//! The audio index queried by the extraction pipeline.
//!
//! Mirrors what a platform media store offers: one row per audio file with
//! a handful of cheap columns (title, album, album id, size, dates) filled
//! in at indexing time, queried by predicate and ordered by date added.
//! Rich metadata is not stored here; the extractor reads it per file.
//!
//! - [`selection`]: predicates (`is_music != 0`, folder `LIKE` filters)
//! - [`indexer`]: fills the index from library folders
//! - [`SqliteMediaIndex`]: the production [`MediaIndex`]

pub mod indexer;
pub mod selection;

use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;

pub use indexer::{IndexReport, index_library, prune_missing};
pub use selection::{PathPattern, Selection};

/// One media index entry, prior to file-existence verification.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IndexRow {
    pub id: i64,
    /// Absolute file path
    pub path: String,
    pub title: String,
    pub album: String,
    /// Stable id shared by every row with the same album name
    pub album_id: i64,
    pub artist: String,
    /// Bytes
    pub size: i64,
    /// Unix seconds
    pub date_added: i64,
    /// Unix seconds
    pub date_modified: i64,
    pub is_music: bool,
}

/// Source of candidate rows for a scan.
#[async_trait]
pub trait MediaIndex: Send + Sync + 'static {
    /// Rows matching `selection`, ordered by date added.
    ///
    /// `None` means the index could not be queried at all. Callers treat
    /// that the same as an empty result.
    async fn query(&self, selection: &Selection) -> Option<Vec<IndexRow>>;
}

/// Media index stored in the `media_index` table.
#[derive(Debug, Clone)]
pub struct SqliteMediaIndex {
    pool: SqlitePool,
}

impl SqliteMediaIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of indexed rows.
    pub async fn count(&self) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_index")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MediaIndex for SqliteMediaIndex {
    async fn query(&self, selection: &Selection) -> Option<Vec<IndexRow>> {
        let mut sql = String::from(
            "SELECT id, path, title, album, album_id, artist, size, date_added, date_modified, is_music \
             FROM media_index",
        );
        let args = match selection.to_sql() {
            Some((predicate, args)) => {
                sql.push_str(" WHERE ");
                sql.push_str(&predicate);
                args
            }
            None => Vec::new(),
        };
        sql.push_str(" ORDER BY date_added, id");

        let mut query = sqlx::query_as::<_, IndexRow>(&sql);
        for arg in args {
            query = query.bind(arg);
        }

        match query.fetch_all(&self.pool).await {
            Ok(rows) => {
                tracing::debug!(target: "media_index", rows = rows.len(), "Query returned");
                Some(rows)
            }
            Err(e) => {
                tracing::warn!(target: "media_index", error = %e, "Media index query failed");
                None
            }
        }
    }
}
