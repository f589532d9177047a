//! Error types for the catalog sync core.

use thiserror::Error;

use crate::types::EntityId;

/// Errors raised by pure core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("entity {0} appears more than once in a payload")]
    DuplicateEntity(EntityId),

    #[error("invalid batch size {0}: must be between 1 and 2000")]
    InvalidBatchSize(usize),

    #[error("payload encoding error: {0}")]
    Payload(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
