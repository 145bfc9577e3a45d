//! Error types for the site engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from index and engine operations.
///
/// Local, recoverable conditions (`NotFound`, `AlreadyExists`) are always
/// returned as values; only unexpected filesystem failures propagate through
/// the `Io` variant.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("No document indexed at '{path}'")]
    NotFound { path: String },

    #[error("Path '{path}' is already in use by another document")]
    AlreadyExists { path: String },

    #[error("Document at '{path}' is not a directory")]
    NotADirectory { path: String },

    #[error("Invalid document name '{name}'")]
    InvalidName { name: String },

    #[error("'{path}' does not contain a site (missing configuration directory)")]
    NotASite { path: PathBuf },

    #[error("Site format '{found}' requires migration (current format is '{current}')")]
    MigrationRequired { found: String, current: String },

    #[error("Failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for SiteError {
    fn from(e: figment::Error) -> Self {
        SiteError::Config(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
