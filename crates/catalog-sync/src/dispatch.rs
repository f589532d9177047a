//! Dispatcher-side queue operations.
//!
//! The worker that transmits jobs runs out of process, but it follows a
//! fixed protocol against the same store: claim (mark dispatched, making
//! the job immutable), transmit, then acknowledge (reconcile the ledger and
//! remove the job). This module implements that protocol so hosts and
//! tests drive the queue the same way.

use std::sync::Arc;

use catalog_sync_core::{ChannelId, Job, JobKind};
use catalog_sync_store::{StoreError, SyncStore};

use crate::error::Result;

/// Claims and acknowledges jobs on behalf of the transmitting worker.
pub struct JobDispatcher<S> {
    store: Arc<S>,
}

impl<S: SyncStore> JobDispatcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Claim the oldest pending job for (kind, channel).
    ///
    /// The returned job is already marked dispatched; later merge attempts
    /// against it fail with `StaleJob`.
    ///
    /// Jobs another worker claimed between the listing and the claim are
    /// skipped, so each job is handed out once.
    pub async fn claim_next(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        let jobs = self.store.list_jobs(kind, channel).await?;

        for mut job in jobs.into_iter().filter(Job::is_pending) {
            match self.store.mark_dispatched(job.id).await {
                Ok(()) => {
                    job.dispatched = true;
                    tracing::debug!(channel = %channel, job_id = %job.id, size = job.payload.len(), "job claimed");
                    return Ok(Some(job));
                }
                Err(StoreError::StaleJob(id)) => {
                    tracing::debug!(channel = %channel, job_id = %id, "job already claimed, trying next");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Record that the search index accepted `job`.
    ///
    /// Clears the pending mark of every id in the payload. A change to one of
    /// those entities made after the claim was filtered out while it was
    /// still pending, so it is not queued again until the next trigger.
    pub async fn acknowledge(&self, job: &Job, at: i64) -> Result<()> {
        self.store
            .mark_synced(job.payload.as_slice(), &job.channel, at)
            .await?;
        self.store.complete_job(job.id).await?;
        tracing::info!(channel = %job.channel, job_id = %job.id, count = job.payload.len(), "job acknowledged");
        Ok(())
    }
}
