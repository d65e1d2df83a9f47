// src/error.rs

//! Unified error handling for the importer application.

use thiserror::Error;

/// Result type alias for importer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Per-page and per-item scrape failures are deliberately NOT represented
/// here: importers collect those as plain strings and the run summary
/// reports them. Only configuration, selection, and database problems
/// surface as errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database operation failed
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Import run error (bad selection, no usable importers)
    #[error("Import error: {0}")]
    Import(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an import run error.
    pub fn import(message: impl Into<String>) -> Self {
        Self::Import(message.into())
    }
}
