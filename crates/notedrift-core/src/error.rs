//! Error types for notedrift-core

use thiserror::Error;

/// Result type alias using notedrift-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notedrift-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(i64),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
