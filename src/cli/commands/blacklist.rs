//! Blacklist management commands.

use clap::Subcommand;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::warn;

use super::{location, open_library};
use crate::config::Config;
use crate::db;

#[derive(Subcommand)]
pub enum BlacklistAction {
    /// Hide one song from the library
    AddSong {
        /// Path of the audio file
        path: PathBuf,
    },
    /// Hide every song under a folder
    AddFolder {
        /// Folder path
        path: PathBuf,
    },
    /// Show blacklisted songs and folders
    List,
    /// Stop hiding a folder
    RemoveFolder {
        /// Folder path
        path: PathBuf,
    },
}

/// Run a blacklist action
pub fn cmd_blacklist(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    action: &BlacklistAction,
) -> anyhow::Result<()> {
    rt.block_on(blacklist(db_path, config, action))
}

async fn blacklist(
    db_path: Option<&Path>,
    config: &Config,
    action: &BlacklistAction,
) -> anyhow::Result<()> {
    let library = open_library(db_path, config).await?;
    match action {
        BlacklistAction::AddSong { path } => {
            let location = location(path)?;
            let stored = db::get_song(library.pool(), &location).await?;
            let song = match stored {
                Some(song) => song,
                None => match library.extractor().resolve_song(&location).await {
                    Some(song) => song,
                    None => anyhow::bail!("{} is not indexed", path.display()),
                },
            };
            library.blacklist_songs(std::slice::from_ref(&song)).await?;
            println!("Blacklisted {} - {}", song.artist, song.title);
        }
        BlacklistAction::AddFolder { path } => {
            if library.blacklist_folder(&location(path)?).await? {
                println!("Blacklisted folder {}", path.display());
            } else {
                println!("{} was already blacklisted", path.display());
            }
        }
        BlacklistAction::List => {
            let songs = library.blacklisted_songs().await?;
            let folders = library.blacklisted_folders().await?;
            println!("Songs ({}):", songs.len());
            for song in &songs {
                println!("  {} - {} ({})", song.artist, song.title, song.location);
            }
            println!("Folders ({}):", folders.len());
            for folder in &folders {
                println!("  {}", folder.path);
            }
        }
        BlacklistAction::RemoveFolder { path } => {
            if library.whitelist_folder(&location(path)?).await? {
                println!(
                    "Removed {} from the blacklist. Rescan to see its songs.",
                    path.display()
                );
            } else {
                println!("{} was not blacklisted", path.display());
            }
        }
    }
    Ok(())
}

/// Remove songs from the blacklist
pub fn cmd_restore(
    rt: &Runtime,
    db_path: Option<&Path>,
    config: &Config,
    paths: &[PathBuf],
) -> anyhow::Result<()> {
    rt.block_on(restore(db_path, config, paths))
}

async fn restore(db_path: Option<&Path>, config: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let library = open_library(db_path, config).await?;
    let session = library.restore_session().await?;

    let locations = paths
        .iter()
        .map(|p| location(p))
        .collect::<anyhow::Result<Vec<String>>>()?;
    let selected = session.select_locations(locations.iter().map(String::as_str));
    if selected < locations.len() {
        warn!(
            target: "library",
            requested = locations.len(),
            selected,
            "Some paths are not blacklisted"
        );
    }
    if selected == 0 {
        println!("Nothing to restore.");
        return Ok(());
    }

    let restored = session.restore().await?;
    println!("Restored {} song(s). Rescan to see them.", restored);
    Ok(())
}
