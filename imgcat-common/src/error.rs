//! Common error types for imgcat

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for imgcat bootstrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or opening the catalog database
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file exists but could not be parsed
    #[error("Invalid TOML in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration is present but unusable (missing endpoint, bad URL, ...)
    #[error("Configuration error: {0}")]
    Config(String),
}
