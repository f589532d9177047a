//! # Catalog Sync Core
//!
//! Pure primitives for catalog sync: identifiers, queued jobs, ledger
//! records and batch planning.
//!
//! This crate contains no I/O and no storage. It is pure computation over
//! sets of entity ids.
//!
//! ## Key Types
//!
//! - [`EntityId`] - Stable id of a catalog item
//! - [`ChannelId`] - Sales channel ("store") partitioning all sync state
//! - [`Job`] - A queued batch of ids for one (kind, channel)
//! - [`SyncRecord`] - Per (entity, channel) pending/synced state
//!
//! ## Planning
//!
//! [`plan`] chunks candidates into size-bounded batches and [`try_merge`]
//! folds a batch into a pending payload when the union still fits.

pub mod error;
pub mod job;
pub mod planner;
pub mod record;
pub mod types;

pub use error::{CoreError, Result};
pub use job::{Job, JobPayload};
pub use planner::{
    dedupe_preserving_order, plan, try_merge, validate_batch_size, Batch, MergeResult,
    MAX_BATCH_SIZE_LIMIT,
};
pub use record::SyncRecord;
pub use types::{ChannelId, EntityId, JobId, JobKind};
