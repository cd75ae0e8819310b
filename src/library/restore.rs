//! Selecting blacklisted songs and restoring them to the library.

use parking_lot::Mutex;
use sqlx::SqlitePool;

use crate::db;
use crate::error::{Error, Result};
use crate::model::BlacklistedSong;

/// Where a [`RestoreSession`] is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreState {
    Idle,
    Loading,
    Success,
    Error(String),
}

#[derive(Debug)]
struct Inner {
    selected: Vec<bool>,
    state: RestoreState,
}

/// A snapshot of the blacklist with one selection flag per entry.
///
/// Restored songs reappear after the next scan.
#[derive(Debug)]
pub struct RestoreSession {
    pool: SqlitePool,
    entries: Vec<BlacklistedSong>,
    inner: Mutex<Inner>,
}

impl RestoreSession {
    pub fn new(pool: SqlitePool, entries: Vec<BlacklistedSong>) -> Self {
        let selected = vec![false; entries.len()];
        Self {
            pool,
            entries,
            inner: Mutex::new(Inner {
                selected,
                state: RestoreState::Idle,
            }),
        }
    }

    pub fn entries(&self) -> &[BlacklistedSong] {
        &self.entries
    }

    pub fn state(&self) -> RestoreState {
        self.inner.lock().state.clone()
    }

    /// Mark entry `index` as selected or not.
    ///
    /// Returns false (and changes nothing) unless the session is idle and
    /// `index` is in range.
    pub fn toggle(&self, index: usize, selected: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != RestoreState::Idle {
            return false;
        }
        match inner.selected.get_mut(index) {
            Some(flag) => {
                *flag = selected;
                true
            }
            None => false,
        }
    }

    /// Select every entry whose location is in `locations`.
    pub fn select_locations<'a>(&self, locations: impl IntoIterator<Item = &'a str>) -> usize {
        let mut count = 0;
        for location in locations {
            if let Some(index) = self.entries.iter().position(|e| e.location == location) {
                if self.toggle(index, true) {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn selected(&self) -> Vec<&BlacklistedSong> {
        let inner = self.inner.lock();
        self.entries
            .iter()
            .zip(inner.selected.iter())
            .filter_map(|(entry, &selected)| selected.then_some(entry))
            .collect()
    }

    /// Remove the selected entries from the blacklist.
    ///
    /// Moves through `Loading` to `Success` or `Error`. Returns the number
    /// of entries removed.
    pub async fn restore(&self) -> Result<u64> {
        {
            let mut inner = self.inner.lock();
            if inner.state == RestoreState::Loading {
                return Err(Error::restore("a restore is already running"));
            }
            inner.state = RestoreState::Loading;
        }

        let locations: Vec<String> = self
            .selected()
            .into_iter()
            .map(|entry| entry.location.clone())
            .collect();

        match db::delete_blacklisted_songs(&self.pool, &locations).await {
            Ok(removed) => {
                tracing::info!(target: "library", restored = removed, "Restored blacklisted songs, rescan to see them");
                self.inner.lock().state = RestoreState::Success;
                Ok(removed)
            }
            Err(e) => {
                tracing::error!(target: "library", error = %e, "Restore failed");
                self.inner.lock().state = RestoreState::Error(e.to_string());
                Err(Error::restore(e.to_string()))
            }
        }
    }
}
