//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `index`: Populating the media index from library folders
//! - `scan`: Library scans, listings and single-file lookups
//! - `blacklist`: Blacklist management and restores

mod blacklist;
mod index;
mod scan;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};

use crate::config::{self, Config};
use crate::db;
use crate::extractor::{ExtractorOptions, SongExtractor, TracingCrashReporter};
use crate::library::Library;
use crate::media_index::SqliteMediaIndex;
use crate::metadata::LoftyRetriever;

pub use blacklist::{BlacklistAction, cmd_blacklist, cmd_restore};
pub use index::cmd_index;
pub use scan::{cmd_list, cmd_resolve, cmd_scan};

/// Music Indexer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path (defaults to the configured one, then ./music_indexer.db)
    #[arg(long, global = true, env = "MUSIC_INDEXER_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Index audio files under library folders
    Index {
        /// Folders to index (defaults to the configured library roots)
        paths: Vec<PathBuf>,
        /// Drop index rows whose file no longer exists
        #[arg(long)]
        prune: bool,
    },
    /// Extract every indexed song and store the library
    Scan,
    /// List indexed songs without storing them
    List {
        /// Only songs directly inside this folder
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Skip metadata reads and show the reduced projection
        #[arg(long)]
        mini: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Extract a single indexed file
    Resolve {
        /// Path of the audio file
        path: PathBuf,
    },
    /// Manage blacklisted songs and folders
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
    /// Remove songs from the blacklist
    Restore {
        /// Locations of the blacklisted songs
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

/// Production library wiring.
pub type AppLibrary = Library<SqliteMediaIndex, LoftyRetriever>;

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = config::load();
    let db_path = cli.db.as_deref().or(config.library.database.as_deref());

    match &cli.command {
        Commands::Index { paths, prune } => cmd_index(&rt, db_path, &config, paths, *prune),
        Commands::Scan => cmd_scan(&rt, db_path, &config),
        Commands::List { folder, mini, json } => {
            cmd_list(&rt, db_path, &config, folder.as_deref(), *mini, *json)
        }
        Commands::Resolve { path } => cmd_resolve(&rt, db_path, &config, path),
        Commands::Blacklist { action } => cmd_blacklist(&rt, db_path, &config, action),
        Commands::Restore { paths } => cmd_restore(&rt, db_path, &config, paths),
    }
}

/// Open the database and wire up a library on the current runtime.
async fn open_library(db_path: Option<&Path>, config: &Config) -> anyhow::Result<AppLibrary> {
    let pool = db::init_db(&db::db_url(db_path)).await?;
    let extractor = SongExtractor::new(
        Handle::current(),
        SqliteMediaIndex::new(pool.clone()),
        LoftyRetriever,
        Arc::new(TracingCrashReporter),
        ExtractorOptions::from(&config.scan),
    );
    Ok(Library::new(pool, extractor))
}

/// Absolute form of a path given on the command line.
///
/// The index stores absolute paths, so `./Album` must become
/// `<cwd>/Album` before it is compared with anything. Symlinks are left
/// alone.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// [`absolute`] as an index location string.
fn location(path: &Path) -> anyhow::Result<String> {
    Ok(absolute(path)?.to_string_lossy().into_owned())
}
