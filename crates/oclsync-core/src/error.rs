//! Error types for oclsync-core

use thiserror::Error;

use crate::models::UpdateId;

/// Result type alias using oclsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in oclsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Update record not found
    #[error("Update not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another update is still running
    #[error("Another update is in progress: {0}")]
    Conflict(String),

    /// The update has already been stopped
    #[error("Update {0} has already been stopped")]
    AlreadyStopped(UpdateId),
}

impl Error {
    /// True when the error means another run holds the active slot.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
