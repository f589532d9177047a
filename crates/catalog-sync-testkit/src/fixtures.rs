//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an in-memory catalog, a
//! channel directory with ready-made credentials, and store wrappers that
//! inject failures or simulate the dispatcher winning a race.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use catalog_sync::{
    CatalogSource, ChannelCredentials, StaticChannelDirectory, SyncConfig, SyncOrchestrator,
};
use catalog_sync_core::{ChannelId, EntityId, Job, JobId, JobKind, JobPayload, SyncRecord};
use catalog_sync_store::{JobStore, MemoryStore, Result, StoreError, SyncLedger};

/// Ids `{prefix}0 .. {prefix}{n-1}`.
pub fn entity_ids(prefix: &str, n: usize) -> Vec<EntityId> {
    (0..n).map(|i| EntityId::new(format!("{prefix}{i}"))).collect()
}

/// Credentials that pass the completeness check.
pub fn valid_credentials(store_id: &str) -> ChannelCredentials {
    ChannelCredentials {
        store_id: store_id.to_string(),
        store_secret: "secret".to_string(),
        api_key: "api-key".to_string(),
    }
}

/// A catalog held in memory.
#[derive(Default)]
pub struct StaticCatalog {
    entities: RwLock<HashMap<ChannelId, Vec<EntityId>>>,
    active: RwLock<Vec<ChannelId>>,
    fail_listing: AtomicBool,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel and its entities. The channel becomes active.
    pub fn with_channel(self, channel: impl Into<ChannelId>, ids: Vec<EntityId>) -> Self {
        self.add_channel(channel, ids);
        self
    }

    /// Register or replace a channel's entities.
    pub fn add_channel(&self, channel: impl Into<ChannelId>, ids: Vec<EntityId>) {
        let channel = channel.into();
        if let Ok(mut active) = self.active.write() {
            if !active.contains(&channel) {
                active.push(channel.clone());
            }
        }
        if let Ok(mut entities) = self.entities.write() {
            entities.insert(channel, ids);
        }
    }

    /// Make every listing call fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail_listing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn list_all_entity_ids(&self, channel: &ChannelId) -> anyhow::Result<Vec<EntityId>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("catalog unavailable");
        }
        let entities = self
            .entities
            .read()
            .map_err(|_| anyhow::anyhow!("catalog lock poisoned"))?;
        Ok(entities.get(channel).cloned().unwrap_or_default())
    }

    async fn list_active_channels(&self) -> anyhow::Result<Vec<ChannelId>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            anyhow::bail!("catalog unavailable");
        }
        let active = self
            .active
            .read()
            .map_err(|_| anyhow::anyhow!("catalog lock poisoned"))?;
        Ok(active.clone())
    }
}

/// Which store operations should fail.
#[derive(Debug, Default)]
pub struct FaultPlan {
    pub fail_filter: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_mark_pending: AtomicBool,
}

/// A memory store whose operations can be made to fail on demand.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub faults: FaultPlan,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidData(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncLedger for FaultyStore {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        Self::check(&self.faults.fail_filter, "filter_unsynced")?;
        self.inner.filter_unsynced(ids, channel).await
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        Self::check(&self.faults.fail_mark_pending, "mark_pending")?;
        self.inner.mark_pending(ids, channel, now).await
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        self.inner.mark_synced(ids, channel, at).await
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        self.inner.get_record(id, channel).await
    }
}

#[async_trait]
impl JobStore for FaultyStore {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        self.inner.latest_pending(kind, channel).await
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        Self::check(&self.faults.fail_create, "create_job")?;
        self.inner.create_job(kind, channel, payload, now).await
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        self.inner.edit_job(job, payload).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        self.inner.list_jobs(kind, channel).await
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        self.inner.mark_dispatched(id).await
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        self.inner.complete_job(id).await
    }
}

/// A memory store where the dispatcher claims every job the moment the
/// orchestrator looks it up, so the following edit always loses the race.
#[derive(Default)]
pub struct DispatchRaceStore {
    pub inner: MemoryStore,
}

impl DispatchRaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLedger for DispatchRaceStore {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        self.inner.filter_unsynced(ids, channel).await
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        self.inner.mark_pending(ids, channel, now).await
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        self.inner.mark_synced(ids, channel, at).await
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        self.inner.get_record(id, channel).await
    }
}

#[async_trait]
impl JobStore for DispatchRaceStore {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        let job = self.inner.latest_pending(kind, channel).await?;
        if let Some(job) = &job {
            self.inner.mark_dispatched(job.id).await?;
        }
        Ok(job)
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        self.inner.create_job(kind, channel, payload, now).await
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        self.inner.edit_job(job, payload).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        self.inner.list_jobs(kind, channel).await
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        self.inner.mark_dispatched(id).await
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        self.inner.complete_job(id).await
    }
}

/// A memory store where another worker claims the oldest pending job right
/// after every listing, so the listing a dispatcher acts on is already stale.
#[derive(Default)]
pub struct ClaimRaceStore {
    pub inner: MemoryStore,
}

impl ClaimRaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLedger for ClaimRaceStore {
    async fn filter_unsynced(
        &self,
        ids: &[EntityId],
        channel: &ChannelId,
    ) -> Result<Vec<EntityId>> {
        self.inner.filter_unsynced(ids, channel).await
    }

    async fn mark_pending(&self, ids: &[EntityId], channel: &ChannelId, now: i64) -> Result<()> {
        self.inner.mark_pending(ids, channel, now).await
    }

    async fn mark_synced(&self, ids: &[EntityId], channel: &ChannelId, at: i64) -> Result<()> {
        self.inner.mark_synced(ids, channel, at).await
    }

    async fn get_record(&self, id: &EntityId, channel: &ChannelId) -> Result<Option<SyncRecord>> {
        self.inner.get_record(id, channel).await
    }
}

#[async_trait]
impl JobStore for ClaimRaceStore {
    async fn latest_pending(&self, kind: &JobKind, channel: &ChannelId) -> Result<Option<Job>> {
        self.inner.latest_pending(kind, channel).await
    }

    async fn create_job(
        &self,
        kind: &JobKind,
        channel: &ChannelId,
        payload: JobPayload,
        now: i64,
    ) -> Result<Job> {
        self.inner.create_job(kind, channel, payload, now).await
    }

    async fn edit_job(&self, job: &Job, payload: JobPayload) -> Result<Job> {
        self.inner.edit_job(job, payload).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, kind: &JobKind, channel: &ChannelId) -> Result<Vec<Job>> {
        let snapshot = self.inner.list_jobs(kind, channel).await?;
        if let Some(job) = snapshot.iter().find(|job| job.is_pending()) {
            self.inner.mark_dispatched(job.id).await?;
        }
        Ok(snapshot)
    }

    async fn mark_dispatched(&self, id: JobId) -> Result<()> {
        self.inner.mark_dispatched(id).await
    }

    async fn complete_job(&self, id: JobId) -> Result<()> {
        self.inner.complete_job(id).await
    }
}

/// Orchestrator over a memory store, a static catalog and a directory
/// where the given channels are enabled.
pub type TestOrchestrator<S = MemoryStore> =
    SyncOrchestrator<S, Arc<StaticCatalog>, StaticChannelDirectory>;

/// A test fixture bundling the collaborators an orchestrator needs.
pub struct TestFixture<S = MemoryStore> {
    pub store: Arc<S>,
    pub catalog: Arc<StaticCatalog>,
    pub channels: StaticChannelDirectory,
}

impl TestFixture<MemoryStore> {
    /// A fixture over a fresh memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TestFixture<S>
where
    S: SyncLedger + JobStore,
{
    /// A fixture over the given store.
    pub fn with_store(store: S) -> Self {
        Self {
            store: Arc::new(store),
            catalog: Arc::new(StaticCatalog::new()),
            channels: StaticChannelDirectory::new(),
        }
    }

    /// Add a channel with entities and valid credentials.
    pub fn with_channel(mut self, channel: &str, ids: Vec<EntityId>) -> Self {
        self.catalog.add_channel(channel, ids);
        self.channels = self.channels.with_channel(channel, valid_credentials(channel));
        self
    }

    /// Add an active catalog channel that has no credentials.
    pub fn with_disabled_channel(self, channel: &str, ids: Vec<EntityId>) -> Self {
        self.catalog.add_channel(channel, ids);
        self
    }

    /// Build an orchestrator sharing this fixture's store.
    pub fn orchestrator(&self, config: SyncConfig) -> TestOrchestrator<S> {
        SyncOrchestrator::with_shared_store(
            self.store.clone(),
            self.catalog.clone(),
            self.channels.clone(),
            config,
        )
        .expect("valid test configuration")
    }
}
