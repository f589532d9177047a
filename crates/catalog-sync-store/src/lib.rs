//! # Catalog Sync Store
//!
//! Storage for catalog sync: the per-channel sync ledger and the durable
//! job queue, behind trait-based interfaces with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`SyncLedger`] - Which entities already have a queued, untransmitted change
//! - [`JobStore`] - Pending/dispatched jobs keyed by (kind, channel)
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catalog_sync_store::{JobStore, SqliteStore, SyncLedger};
//! use catalog_sync_core::{ChannelId, EntityId, JobKind, JobPayload};
//!
//! async fn example() {
//!     let store = SqliteStore::open("sync.db").unwrap();
//!     let channel = ChannelId::from("1");
//!     let ids = vec![EntityId::from("42")];
//!
//!     let unsynced = store.filter_unsynced(&ids, &channel).await.unwrap();
//!     let payload = JobPayload::from_unique(unsynced.clone()).unwrap();
//!     store
//!         .create_job(&JobKind::index_products(), &channel, payload, 0)
//!         .await
//!         .unwrap();
//!     store.mark_pending(&unsynced, &channel, 0).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Dispatched jobs are immutable**: `edit_job` is a compare-and-swap on
//!   the dispatched flag and fails with `StaleJob` when it loses the race.
//! - **Records are never deleted**: a transmitted entity keeps its record
//!   with `pending_since` cleared.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{JobStore, SyncLedger, SyncStore};
