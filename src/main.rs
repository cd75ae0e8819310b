//! Music Indexer - A music library indexing and extraction tool.
//!
//! Audio files under library folders are recorded in a media index. A scan
//! then reads each indexed file's metadata concurrently and stores the
//! resulting songs and albums, honouring song and folder blacklists.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod library;
pub mod media_index;
pub mod metadata;
pub mod model;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_TARGETS: [&str; 8] = [
    "music_indexer",
    "config",
    "scanner",
    "indexer",
    "media_index",
    "extractor",
    "library",
    "db",
];

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging. Pipeline modules log under short targets.
    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        filter = filter.add_directive(format!("{target}=info").parse()?);
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
