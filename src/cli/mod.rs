//! Command-line interface for music-indexer.
//!
//! This module provides CLI commands for indexing library folders, running
//! scans, listing songs and managing the blacklist.

mod commands;

pub use commands::{Cli, Commands, run_command};
