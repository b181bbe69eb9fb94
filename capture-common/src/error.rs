//! Shared error type for the capture services

use thiserror::Error;

/// Result alias used by the shared library and by service crates
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration loading, database bootstrap and storage access
#[derive(Error, Debug)]
pub enum Error {
    /// Report database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem operation failed (artifact store, config file, root folder)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested report or pair does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data could not be (de)serialized or violated an invariant
    #[error("Internal error: {0}")]
    Internal(String),
}
