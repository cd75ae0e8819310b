//! Application-wide error types.
//!
//! Library modules return [`Error`] through the [`Result`] alias, while the
//! CLI entry point uses `anyhow` for convenient propagation.
//!
//! Most per-file failures never reach this type as a propagated error: the
//! extraction pipeline degrades them to "drop this item" and only hands them
//! to a [`CrashReporter`](crate::extractor::CrashReporter). What remains here
//! are store, configuration and setup failures.

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata reading error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A scan was requested while another one is still running
    #[error("A library scan is already in progress")]
    ScanInProgress,

    /// A spawned task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),

    /// Blacklist restore failed or was requested in the wrong state
    #[error("Restore error: {0}")]
    Restore(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task(message.into())
    }

    /// Create a restore error.
    pub fn restore(message: impl Into<String>) -> Self {
        Self::Restore(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
