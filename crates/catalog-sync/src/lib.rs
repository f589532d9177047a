//! # Catalog Sync
//!
//! Keeps an external search index in step with a product catalog by
//! queuing changed items, per sales channel, as size-bounded jobs for an
//! out-of-process worker.
//!
//! ## Overview
//!
//! - **Ledger**: which entities already have a queued, untransmitted change
//! - **Planner**: deterministic chunking into batches of at most
//!   `max_batch_size` ids
//! - **Job queue**: pending jobs per (kind, channel), editable until dispatched
//! - **Orchestrator**: one entry point per trigger shape
//!
//! ## Triggers
//!
//! | Host event            | Call                               | Folds into pending job |
//! |-----------------------|------------------------------------|------------------------|
//! | Full reindex          | [`SyncOrchestrator::sync_all`]     | never                  |
//! | Scheduled / list      | [`SyncOrchestrator::sync_many`]    | single-batch plans     |
//! | Single row update     | [`SyncOrchestrator::sync_one`]     | single-batch plans     |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catalog_sync::{StaticChannelDirectory, SyncConfig, SyncOrchestrator};
//! use catalog_sync::store::SqliteStore;
//! # use catalog_sync::CatalogSource;
//! # async fn example(catalog: impl CatalogSource) {
//!
//! let store = SqliteStore::open("sync.db").unwrap();
//! let channels = StaticChannelDirectory::new();
//! let orchestrator =
//!     SyncOrchestrator::new(store, catalog, channels, SyncConfig::default()).unwrap();
//!
//! let report = orchestrator.sync_one("42".into(), None).await.unwrap();
//! for channel in &report.channels {
//!     println!("{}: {:?}", channel.channel, channel.outcome);
//! }
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `catalog_sync::core` - Identifiers, jobs, planner
//! - `catalog_sync::store` - Ledger and job queue storage

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod orchestrator;

// Re-export component crates
pub use catalog_sync_core as core;
pub use catalog_sync_store as store;

// Re-export main types for convenience
pub use channels::{CatalogSource, ChannelCredentials, ChannelDirectory, StaticChannelDirectory};
pub use config::SyncConfig;
pub use dispatch::JobDispatcher;
pub use error::{Result, SyncError};
pub use orchestrator::{ChannelOutcome, ChannelReport, SyncOrchestrator, SyncReport};

// Re-export commonly used core types
pub use catalog_sync_core::{ChannelId, EntityId, Job, JobId, JobKind, JobPayload, SyncRecord};
