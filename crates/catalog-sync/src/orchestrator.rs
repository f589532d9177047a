//! The sync orchestrator: from "these entities changed" to queued jobs.
//!
//! Every trigger reduces to the same per-channel step:
//!
//! 1. Drop candidates that already have a queued change (ledger filter).
//! 2. Plan size-bounded batches.
//! 3. If the trigger combines and the plan is a single batch, try to fold it
//!    into the latest pending job of the same (kind, channel).
//! 4. Otherwise (or when the fold is rejected or loses a race with the
//!    dispatcher) create one job per batch.
//! 5. Mark every queued entity pending, once, after all job writes.
//!
//! The step for one (kind, channel) runs under an exclusive lock so two
//! overlapping triggers cannot both pass the filter for the same entity.

use std::collections::HashMap;
use std::sync::Arc;

use catalog_sync_core::{
    dedupe_preserving_order, plan, try_merge, ChannelId, EntityId, Job, JobId, JobKind,
    JobPayload, MergeResult,
};
use catalog_sync_store::{StoreError, SyncStore};
use tokio::sync::Mutex;

use crate::channels::{CatalogSource, ChannelDirectory};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// What happened to one channel during a trigger.
#[derive(Debug)]
pub enum ChannelOutcome {
    /// Jobs were written and entities marked pending.
    Synced {
        /// Jobs created, in batch order.
        created: Vec<JobId>,
        /// The pending job the batch was folded into, if any.
        merged: Option<JobId>,
        /// Number of entities queued.
        entities: usize,
    },
    /// Every candidate already had a queued change.
    NothingToSync,
    /// The channel is not enabled for sync.
    Skipped,
    /// The step failed; nothing was marked pending. Safe to retry.
    Failed(SyncError),
}

impl ChannelOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed(_))
    }
}

/// Outcome for one channel.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: ChannelId,
    pub outcome: ChannelOutcome,
}

/// Result of one trigger across all affected channels.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Per-channel outcomes, in processing order.
    pub channels: Vec<ChannelReport>,
}

impl SyncReport {
    /// Outcome for a specific channel.
    pub fn outcome(&self, channel: &ChannelId) -> Option<&ChannelOutcome> {
        self.channels
            .iter()
            .find(|report| &report.channel == channel)
            .map(|report| &report.outcome)
    }

    /// Whether no channel failed.
    pub fn is_success(&self) -> bool {
        !self.channels.iter().any(|report| report.outcome.is_failed())
    }

    /// Channels whose step failed.
    pub fn failed_channels(&self) -> Vec<&ChannelId> {
        self.channels
            .iter()
            .filter(|report| report.outcome.is_failed())
            .map(|report| &report.channel)
            .collect()
    }

    /// Total number of jobs created across channels.
    pub fn jobs_created(&self) -> usize {
        self.channels
            .iter()
            .map(|report| match &report.outcome {
                ChannelOutcome::Synced { created, .. } => created.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Where a trigger's candidates come from.
#[derive(Debug, Clone)]
enum Candidates {
    /// Everything the catalog knows for the channel.
    All,
    /// An explicit list of changed ids.
    Ids(Vec<EntityId>),
}

#[derive(Debug, Clone)]
struct Trigger {
    candidates: Candidates,
    /// Whether a single-batch plan may fold into a pending job.
    combine: bool,
}

/// Entry point for all sync triggers.
pub struct SyncOrchestrator<S, C, D> {
    /// Ledger and job queue.
    store: Arc<S>,
    /// Host catalog.
    catalog: C,
    /// Channel enable switch.
    channels: D,
    /// Configuration.
    config: SyncConfig,
    /// One lock per (kind, channel). Entries are never evicted; the map is
    /// bounded by the number of channels times job kinds.
    locks: Mutex<HashMap<(JobKind, ChannelId), Arc<Mutex<()>>>>,
}

impl<S, C, D> SyncOrchestrator<S, C, D>
where
    S: SyncStore,
    C: CatalogSource,
    D: ChannelDirectory,
{
    /// Create a new orchestrator. Fails on invalid configuration.
    pub fn new(store: S, catalog: C, channels: D, config: SyncConfig) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), catalog, channels, config)
    }

    /// Create an orchestrator over a store shared with other components
    /// (typically the dispatcher).
    pub fn with_shared_store(
        store: Arc<S>,
        catalog: C,
        channels: D,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            catalog,
            channels,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Triggers
    // ─────────────────────────────────────────────────────────────────────────

    /// Full resync: queue every catalog entity that is not already pending.
    ///
    /// Never folds into existing jobs. `channel = None` targets every
    /// active channel.
    pub async fn sync_all(&self, channel: Option<&ChannelId>) -> Result<SyncReport> {
        let trigger = Trigger {
            candidates: Candidates::All,
            combine: false,
        };
        self.run(trigger, channel).await
    }

    /// Queue a list of changed entities.
    pub async fn sync_many(
        &self,
        ids: Vec<EntityId>,
        channel: Option<&ChannelId>,
    ) -> Result<SyncReport> {
        if ids.is_empty() {
            return Ok(SyncReport::default());
        }
        let trigger = Trigger {
            candidates: Candidates::Ids(dedupe_preserving_order(ids)),
            combine: true,
        };
        self.run(trigger, channel).await
    }

    /// Queue a single changed entity.
    pub async fn sync_one(&self, id: EntityId, channel: Option<&ChannelId>) -> Result<SyncReport> {
        let trigger = Trigger {
            candidates: Candidates::Ids(vec![id]),
            combine: true,
        };
        self.run(trigger, channel).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-channel step
    // ─────────────────────────────────────────────────────────────────────────

    async fn run(&self, trigger: Trigger, target: Option<&ChannelId>) -> Result<SyncReport> {
        let channels = match target {
            Some(channel) => vec![channel.clone()],
            None => self
                .catalog
                .list_active_channels()
                .await
                .map_err(SyncError::Catalog)?,
        };

        // Read once so every channel in this invocation plans alike.
        let max_batch_size = self.config.max_batch_size;
        let mut report = SyncReport::default();

        for channel in channels {
            let outcome = match self.channel_enabled(&channel).await {
                Ok(false) => {
                    tracing::debug!(channel = %channel, "channel not enabled for sync, skipping");
                    ChannelOutcome::Skipped
                }
                Ok(true) => match self.sync_channel(&channel, &trigger, max_batch_size).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "channel sync failed");
                        ChannelOutcome::Failed(e)
                    }
                },
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "channel lookup failed");
                    ChannelOutcome::Failed(e)
                }
            };
            report.channels.push(ChannelReport { channel, outcome });
        }

        Ok(report)
    }

    async fn channel_enabled(&self, channel: &ChannelId) -> Result<bool> {
        self.channels
            .is_channel_sync_enabled(channel)
            .await
            .map_err(|source| SyncError::ChannelDirectory {
                channel: channel.clone(),
                source,
            })
    }

    async fn channel_lock(&self, kind: &JobKind, channel: &ChannelId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry((kind.clone(), channel.clone()))
            .or_default()
            .clone()
    }

    async fn sync_channel(
        &self,
        channel: &ChannelId,
        trigger: &Trigger,
        max_batch_size: usize,
    ) -> Result<ChannelOutcome> {
        let kind = &self.config.job_kind;
        let lock = self.channel_lock(kind, channel).await;
        let _guard = lock.lock().await;

        let candidates = match &trigger.candidates {
            Candidates::All => dedupe_preserving_order(
                self.catalog
                    .list_all_entity_ids(channel)
                    .await
                    .map_err(SyncError::Catalog)?,
            ),
            Candidates::Ids(ids) => ids.clone(),
        };

        let unsynced = self.store.filter_unsynced(&candidates, channel).await?;
        if unsynced.is_empty() {
            tracing::debug!(
                channel = %channel,
                candidates = candidates.len(),
                "nothing to sync"
            );
            return Ok(ChannelOutcome::NothingToSync);
        }

        let batches = plan(&unsynced, max_batch_size)?;
        let combinable = trigger.combine && batches.len() == 1;

        tracing::info!(
            channel = %channel,
            kind = %kind,
            count = unsynced.len(),
            batches = batches.len(),
            combinable,
            "adding entities for sync"
        );

        let mut merge_target = if combinable {
            self.store.latest_pending(kind, channel).await?
        } else {
            None
        };

        let now = now_millis();
        let mut created = Vec::new();
        let mut merged = None;

        for batch in batches {
            // At most one attempt per invocation.
            if let Some(existing) = merge_target.take() {
                if let Some(job) = self.merge_into(&existing, &batch, max_batch_size).await? {
                    merged = Some(job.id);
                    continue;
                }
            }

            let payload = JobPayload::from_unique(batch)?;
            let job = self.store.create_job(kind, channel, payload, now).await?;
            tracing::debug!(channel = %channel, job_id = %job.id, size = job.payload.len(), "job created");
            created.push(job.id);
        }

        self.store.mark_pending(&unsynced, channel, now).await?;

        Ok(ChannelOutcome::Synced {
            created,
            merged,
            entities: unsynced.len(),
        })
    }

    /// Fold `batch` into `existing`. `None` means "create a job instead".
    async fn merge_into(
        &self,
        existing: &Job,
        batch: &[EntityId],
        max_batch_size: usize,
    ) -> Result<Option<Job>> {
        let payload = match try_merge(&existing.payload, batch, max_batch_size) {
            MergeResult::Merged(payload) => payload,
            MergeResult::Rejected => {
                tracing::debug!(
                    job_id = %existing.id,
                    existing = existing.payload.len(),
                    incoming = batch.len(),
                    "merge would exceed batch size, creating new job"
                );
                return Ok(None);
            }
        };

        match self.store.edit_job(existing, payload).await {
            Ok(job) => {
                tracing::debug!(job_id = %job.id, size = job.payload.len(), "merged into pending job");
                Ok(Some(job))
            }
            Err(StoreError::StaleJob(id)) => {
                tracing::debug!(job_id = %id, "pending job was dispatched, creating new job");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
