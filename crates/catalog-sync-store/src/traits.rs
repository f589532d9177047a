//! Storage traits: the sync ledger and the job queue.
//!
//! These traits let the orchestrator stay storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync_core::{ChannelId, EntityId, Job, JobId, JobKind, JobPayload, SyncRecord};

use crate::error::Result;

/// Per (entity, channel) record of what still needs to be sent.
///
/// # Design Notes
///
/// - **Read-only filter**: `filter_unsynced` never mutates, so calling it
///   twice without an intervening `mark_pending` returns the same ids.
/// - **Idempotent marks**: `mark_pending` on an already pending record keeps
///   its original timestamp.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    /// Return the ids that are not already pending in `channel`.
    ///
    /// Input order is preserved.
    async fn filter_unsynced(&self, ids: &[EntityId], channel: &ChannelId)
        -> Result<Vec<EntityId>>;

    /// Mark ids as pending, creating records as needed.
    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()>;

    /// Record confirmed transmission: clears pending, sets the last sync time.
    ///
    /// Called by the dispatcher once the search index accepted the batch.
    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()>;

    /// Get the record for one entity.
    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>>;
}

/// Durable queue of jobs keyed by (kind, channel).
///
/// # Design Notes
///
/// - **Optimistic edits**: `edit_job` fails with `StaleJob` if the job has
///   been dispatched or removed by the time the write lands.
/// - **Latest wins**: `latest_pending` returns the most recently created
///   job that has not been dispatched.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Most recently created, not yet dispatched job for (kind, channel).
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>>;

    /// Append a new pending job.
    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job>;

    /// Replace the payload of a pending job.
    ///
    /// Returns the updated job, or `StaleJob` if it is no longer pending.
    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job>;

    /// Get a job by id.
    async fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    /// All jobs for (kind, channel), oldest first.
    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>>;

    /// Mark a job as taken by the dispatcher. From here on it is immutable.
    ///
    /// Fails with `StaleJob` if another claimant already took it.
    async fn mark_dispatched(&self, id: JobId) -> Result<()>;

    /// Remove a job after confirmed transmission.
    async fn complete_job(&self, id: JobId) -> Result<()>;
}

/// A backend that provides both the ledger and the job queue.
pub trait SyncStore: SyncLedger + JobStore {}

impl<S: SyncLedger + JobStore + ?Sized> SyncStore for S {}

#[async_trait]
impl<S: SyncLedger + ?Sized> SyncLedger for Arc<S> {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        (**self).filter_unsynced(ids, channel).await
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        (**self).mark_pending(ids, channel, now).await
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        (**self).mark_synced(ids, channel, at).await
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        (**self).get_record(id, channel).await
    }
}

#[async_trait]
impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        (**self).latest_pending(kind, channel).await
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        (**self).create_job(kind, channel, payload, now).await
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        (**self).edit_job(job, payload).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        (**self).get_job(id).await
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        (**self).list_jobs(kind, channel).await
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        (**self).mark_dispatched(id).await
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        (**self).complete_job(id).await
    }
}
