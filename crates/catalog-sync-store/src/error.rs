//! Error types for the store module.

use catalog_sync_core::{CoreError, JobId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] CoreError),

    /// The job was dispatched (or removed) before the edit landed.
    #[error("{0} is no longer pending")]
    StaleJob(JobId),

    /// Job not found.
    #[error("{0} not found")]
    JobNotFound(JobId),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Whether this is an optimistic edit conflict rather than an I/O failure.
    pub fn is_stale(&self) -> bool {
        matches!(self, StoreError::StaleJob(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
