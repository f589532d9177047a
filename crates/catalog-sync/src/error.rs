//! Error types for the sync orchestrator.

use catalog_sync_core::{ChannelId, CoreError};
use catalog_sync_store::StoreError;
use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage error (ledger or job queue).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Planning or payload error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The host catalog failed to list entities or channels.
    #[error("catalog error: {0}")]
    Catalog(#[source] anyhow::Error),

    /// The channel directory failed to answer for a channel.
    #[error("channel directory error for {channel}: {source}")]
    ChannelDirectory {
        channel: ChannelId,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
