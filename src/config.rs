//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\music-indexer\config.toml
//! - macOS: ~/Library/Application Support/music-indexer/config.toml
//! - Linux: ~/.config/music-indexer/config.toml
//!
//! The config file is human-readable and editable. Missing sections and
//! fields fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// Scan pipeline settings
    pub scan: ScanConfig,
}

/// Library location settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Folders walked by `index`
    pub roots: Vec<PathBuf>,

    /// Database file (None = `music_indexer.db` in the working directory)
    pub database: Option<PathBuf>,
}

/// Extraction and indexing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files whose metadata may be read at the same time
    pub max_concurrent_extractions: usize,

    /// Follow symlinks while walking library roots
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: 16,
            follow_links: false,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("music-indexer"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load() -> Config {
    match config_path() {
        Some(path) => load_from(&path),
        None => {
            tracing::warn!(target: "config", "No config directory on this platform, using defaults");
            Config::default()
        }
    }
}

/// Load configuration from an explicit path.
///
/// Never fails: unreadable or invalid files are logged and replaced by
/// defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::debug!(target: "config", path = %path.display(), "No config file, using defaults");
        return Config::default();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| toml::from_str::<Config>(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => {
            tracing::debug!(target: "config", path = %path.display(), "Loaded config");
            config
        }
        Err(e) => {
            tracing::error!(target: "config", path = %path.display(), error = %e, "Invalid config file, using defaults");
            Config::default()
        }
    }
}

/// Save configuration to an explicit path.
///
/// Creates the parent directory if it doesn't exist and writes through a
/// temp file plus rename.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", path = %path.display(), "Saved config");
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
