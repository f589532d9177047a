//! In-memory implementation of the storage traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use catalog_sync_core::{ChannelId, EntityId, Job, JobId, JobKind, JobPayload, SyncRecord};

use crate::error::{Result, StoreError};
use crate::traits::{JobStore, SyncLedger};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Ledger records indexed by (channel, entity).
    records: HashMap<(ChannelId, EntityId), SyncRecord>,

    /// Jobs in creation order.
    jobs: BTreeMap<JobId, Job>,

    /// Next job id to hand out.
    next_job_id: u64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                records: HashMap::new(),
                jobs: BTreeMap::new(),
                next_job_id: 1,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncLedger for MemoryStore {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter(|id| {
                !inner
                    .records
                    .get(&(channel.clone(), (*id).clone()))
                    .is_some_and(SyncRecord::is_pending)
            })
            .cloned()
            .collect())
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        let mut inner = self.write()?;
        for id in ids {
            inner
                .records
                .entry((channel.clone(), id.clone()))
                .and_modify(|record| record.mark_pending(now))
                .or_insert_with(|| SyncRecord::pending(id.clone(), channel.clone(), now));
        }
        Ok(())
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        for id in ids {
            inner
                .records
                .entry((channel.clone(), id.clone()))
                .or_insert_with(|| SyncRecord {
                    entity: id.clone(),
                    channel: channel.clone(),
                    pending_since: None,
                    last_synced_at: None,
                })
                .mark_synced(at);
        }
        Ok(())
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        let inner = self.read()?;
        Ok(inner.records.get(&(channel.clone(), id.clone())).cloned())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        let inner = self.read()?;
        Ok(inner
            .jobs
            .values()
            .rev()
            .find(|job| job.is_pending() && &job.kind == kind && &job.channel == channel)
            .cloned())
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        let mut inner = self.write()?;
        let id = JobId(inner.next_job_id);
        inner.next_job_id += 1;

        let job = Job {
            id,
            kind: kind.clone(),
            channel: channel.clone(),
            payload,
            dispatched: false,
            created_at: now,
        };
        inner.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        let mut inner = self.write()?;
        match inner.jobs.get_mut(&job.id) {
            Some(stored) if stored.is_pending() => {
                stored.payload = payload;
                Ok(stored.clone())
            }
            _ => Err(StoreError::StaleJob(job.id)),
        }
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let inner = self.read()?;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        let inner = self.read()?;
        Ok(inner
            .jobs
            .values()
            .filter(|job| &job.kind == kind && &job.channel == channel)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        let mut inner = self.write()?;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        if !job.is_pending() {
            return Err(StoreError::StaleJob(id));
        }
        job.dispatched = true;
        Ok(())
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .jobs
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::JobNotFound(id))
    }
}
