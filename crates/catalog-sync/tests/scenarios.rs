//! End-to-end trigger scenarios against the in-memory and SQLite stores.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync::store::{JobStore, MemoryStore, SqliteStore, SyncLedger};
use catalog_sync::{
    ChannelDirectory, ChannelId, ChannelOutcome, EntityId, Job, JobDispatcher, JobId, JobKind,
    JobPayload, SyncConfig, SyncError, SyncOrchestrator, SyncReport,
};
use catalog_sync_testkit::{
    entity_ids, ClaimRaceStore, DispatchRaceStore, FaultyStore, StaticCatalog, TestFixture,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn ids(list: &[&str]) -> Vec<EntityId> {
    list.iter().map(|id| EntityId::from(*id)).collect()
}

fn payload_ids(job: &Job) -> Vec<&str> {
    job.payload.iter().map(EntityId::as_str).collect()
}

async fn jobs<S: JobStore>(store: &S, channel: &ChannelId) -> Vec<Job> {
    store
        .list_jobs(&JobKind::index_products(), channel)
        .await
        .unwrap()
}

/// Unpack a `Synced` outcome as (created, merged, entities).
fn synced(report: &SyncReport, channel: &ChannelId) -> (Vec<JobId>, Option<JobId>, usize) {
    match report.outcome(channel) {
        Some(ChannelOutcome::Synced {
            created,
            merged,
            entities,
        }) => (created.clone(), *merged, *entities),
        other => panic!("expected synced outcome for {channel}, got {other:?}"),
    }
}

/// Seed a pending job and mark its ids pending, the way an earlier trigger
/// would have left the store.
async fn seed_pending_job<S: JobStore + SyncLedger>(
    store: &S,
    channel: &ChannelId,
    payload: Vec<EntityId>,
) -> Job {
    store.mark_pending(&payload, channel, 1).await.unwrap();
    store
        .create_job(
            &JobKind::index_products(),
            channel,
            JobPayload::from_unique(payload).unwrap(),
            1,
        )
        .await
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_entity_creates_job() {
    init_tracing();
    let fixture = TestFixture::new().with_channel("store1", ids(&["p1"]));
    let orchestrator = fixture.orchestrator(SyncConfig::default());
    let channel = ChannelId::from("store1");

    let report = orchestrator
        .sync_one("p1".into(), Some(&channel))
        .await
        .unwrap();

    let (created, merged, entities) = synced(&report, &channel);
    assert_eq!(created.len(), 1);
    assert_eq!(merged, None);
    assert_eq!(entities, 1);

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    assert_eq!(queued.len(), 1);
    assert_eq!(payload_ids(&queued[0]), vec!["p1"]);
    assert!(!queued[0].dispatched);

    let record = fixture
        .store
        .get_record(&"p1".into(), &channel)
        .await
        .unwrap()
        .unwrap();
    assert!(record.is_pending());
}

#[tokio::test]
async fn test_single_entity_merges_into_pending_job() {
    init_tracing();
    let fixture = TestFixture::new().with_channel("store1", ids(&["p1", "p2", "p3"]));
    let channel = ChannelId::from("store1");
    let existing = seed_pending_job(fixture.store.as_ref(), &channel, ids(&["p1", "p2"])).await;

    let orchestrator = fixture.orchestrator(SyncConfig::default());
    let report = orchestrator
        .sync_one("p3".into(), Some(&channel))
        .await
        .unwrap();

    let (created, merged, _) = synced(&report, &channel);
    assert!(created.is_empty());
    assert_eq!(merged, Some(existing.id));

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    assert_eq!(queued.len(), 1);
    assert_eq!(payload_ids(&queued[0]), vec!["p1", "p2", "p3"]);
}

#[tokio::test]
async fn test_merge_fills_to_limit_then_overflows() {
    init_tracing();
    let fixture = TestFixture::new().with_channel("store1", Vec::new());
    let channel = ChannelId::from("store1");
    let existing =
        seed_pending_job(fixture.store.as_ref(), &channel, entity_ids("p", 1999)).await;
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    // 1999 + 1 fits exactly.
    let report = orchestrator
        .sync_one("pX".into(), Some(&channel))
        .await
        .unwrap();
    let (created, merged, _) = synced(&report, &channel);
    assert!(created.is_empty());
    assert_eq!(merged, Some(existing.id));

    // 2000 + 1 does not.
    let report = orchestrator
        .sync_one("pY".into(), Some(&channel))
        .await
        .unwrap();
    let (created, merged, _) = synced(&report, &channel);
    assert_eq!(created.len(), 1);
    assert_eq!(merged, None);

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].payload.len(), 2000);
    assert!(queued[0].payload.contains(&"pX".into()));
    assert!(!queued[0].payload.contains(&"pY".into()));
    assert_eq!(payload_ids(&queued[1]), vec!["pY"]);
}

#[tokio::test]
async fn test_full_resync_chunks_without_merging() {
    init_tracing();
    let fixture = TestFixture::new().with_channel("store1", entity_ids("p", 4500));
    let channel = ChannelId::from("store1");
    let existing = seed_pending_job(fixture.store.as_ref(), &channel, ids(&["outside"])).await;
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    let report = orchestrator.sync_all(Some(&channel)).await.unwrap();

    let (created, merged, entities) = synced(&report, &channel);
    assert_eq!(created.len(), 3);
    assert_eq!(merged, None);
    assert_eq!(entities, 4500);

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    let sizes: Vec<usize> = queued.iter().map(|job| job.payload.len()).collect();
    assert_eq!(sizes, vec![1, 2000, 2000, 500]);
    assert_eq!(queued[0].id, existing.id);
    assert_eq!(payload_ids(&queued[0]), vec!["outside"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge policy
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_multi_batch_list_never_edits_pending_job() {
    let fixture = TestFixture::new().with_channel("1", Vec::new());
    let channel = ChannelId::from("1");
    let existing = seed_pending_job(fixture.store.as_ref(), &channel, ids(&["a"])).await;
    let orchestrator = fixture.orchestrator(SyncConfig::default().with_max_batch_size(2));

    let report = orchestrator
        .sync_many(ids(&["b", "c", "d"]), Some(&channel))
        .await
        .unwrap();

    let (created, merged, _) = synced(&report, &channel);
    assert_eq!(created.len(), 2);
    assert_eq!(merged, None);

    let unchanged = fixture.store.get_job(existing.id).await.unwrap().unwrap();
    assert_eq!(payload_ids(&unchanged), vec!["a"]);
}

#[tokio::test]
async fn test_list_trigger_merges_single_batch() {
    let fixture = TestFixture::new().with_channel("1", Vec::new());
    let channel = ChannelId::from("1");
    let existing = seed_pending_job(fixture.store.as_ref(), &channel, ids(&["c", "a"])).await;
    let orchestrator = fixture.orchestrator(SyncConfig::default().with_max_batch_size(10));

    // Duplicates in the input and ids already pending are both dropped.
    let report = orchestrator
        .sync_many(ids(&["b", "a", "b", "d"]), Some(&channel))
        .await
        .unwrap();

    let (created, merged, entities) = synced(&report, &channel);
    assert!(created.is_empty());
    assert_eq!(merged, Some(existing.id));
    assert_eq!(entities, 2);

    let job = fixture.store.get_job(existing.id).await.unwrap().unwrap();
    assert_eq!(payload_ids(&job), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_stale_pending_job_falls_back_to_create() {
    init_tracing();
    let fixture = TestFixture::with_store(DispatchRaceStore::new()).with_channel("1", Vec::new());
    let channel = ChannelId::from("1");
    let existing = seed_pending_job(fixture.store.as_ref(), &channel, ids(&["p1"])).await;
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    let report = orchestrator
        .sync_one("p2".into(), Some(&channel))
        .await
        .unwrap();

    let (created, merged, _) = synced(&report, &channel);
    assert_eq!(created.len(), 1);
    assert_eq!(merged, None);

    let dispatched = fixture.store.get_job(existing.id).await.unwrap().unwrap();
    assert!(dispatched.dispatched);
    assert_eq!(payload_ids(&dispatched), vec!["p1"]);

    let fresh = fixture.store.get_job(created[0]).await.unwrap().unwrap();
    assert_eq!(payload_ids(&fresh), vec!["p2"]);
}

#[tokio::test]
async fn test_dispatcher_skips_job_claimed_by_another_worker() {
    let store = Arc::new(ClaimRaceStore::new());
    let kind = JobKind::index_products();
    let channel = ChannelId::from("1");
    let first = seed_pending_job(store.as_ref(), &channel, ids(&["p1"])).await;
    let second = seed_pending_job(store.as_ref(), &channel, ids(&["p2"])).await;

    let dispatcher = JobDispatcher::new(store.clone());
    let claimed = dispatcher.claim_next(&kind, &channel).await.unwrap().unwrap();
    assert_eq!(claimed.id, second.id);
    assert!(claimed.dispatched);

    // The other worker holds the first job; this one never hands it out.
    assert!(store.get_job(first.id).await.unwrap().unwrap().dispatched);
    assert!(dispatcher.claim_next(&kind, &channel).await.unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Idempotence and failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_trigger_is_noop() {
    let fixture = TestFixture::new().with_channel("1", entity_ids("p", 5));
    let channel = ChannelId::from("1");
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    orchestrator.sync_all(Some(&channel)).await.unwrap();
    let report = orchestrator.sync_all(Some(&channel)).await.unwrap();
    assert!(matches!(
        report.outcome(&channel),
        Some(ChannelOutcome::NothingToSync)
    ));

    let report = orchestrator
        .sync_one("p3".into(), Some(&channel))
        .await
        .unwrap();
    assert!(matches!(
        report.outcome(&channel),
        Some(ChannelOutcome::NothingToSync)
    ));
    assert_eq!(jobs(fixture.store.as_ref(), &channel).await.len(), 1);
}

#[tokio::test]
async fn test_empty_list_trigger_touches_nothing() {
    let fixture = TestFixture::new().with_channel("1", entity_ids("p", 3));
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    let report = orchestrator.sync_many(Vec::new(), None).await.unwrap();
    assert!(report.channels.is_empty());
    assert!(jobs(fixture.store.as_ref(), &"1".into()).await.is_empty());
}

#[tokio::test]
async fn test_failed_job_write_marks_nothing_pending() {
    init_tracing();
    let fixture = TestFixture::with_store(FaultyStore::new()).with_channel("1", Vec::new());
    let channel = ChannelId::from("1");
    let orchestrator = fixture.orchestrator(SyncConfig::default());
    fixture.store.faults.fail_create.store(true, Ordering::SeqCst);

    let report = orchestrator
        .sync_many(ids(&["p1", "p2"]), Some(&channel))
        .await
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed_channels(), vec![&channel]);
    assert!(matches!(
        report.outcome(&channel),
        Some(ChannelOutcome::Failed(SyncError::Store(_)))
    ));
    assert!(fixture
        .store
        .get_record(&"p1".into(), &channel)
        .await
        .unwrap()
        .is_none());

    // The step is retryable once storage recovers.
    fixture.store.faults.fail_create.store(false, Ordering::SeqCst);
    let report = orchestrator
        .sync_many(ids(&["p1", "p2"]), Some(&channel))
        .await
        .unwrap();
    let (created, _, entities) = synced(&report, &channel);
    assert_eq!(created.len(), 1);
    assert_eq!(entities, 2);
}

#[tokio::test]
async fn test_failed_filter_aborts_channel() {
    let fixture = TestFixture::with_store(FaultyStore::new()).with_channel("1", entity_ids("p", 3));
    let channel = ChannelId::from("1");
    let orchestrator = fixture.orchestrator(SyncConfig::default());
    fixture.store.faults.fail_filter.store(true, Ordering::SeqCst);

    let report = orchestrator.sync_all(Some(&channel)).await.unwrap();
    assert!(report.outcome(&channel).unwrap().is_failed());
    assert!(jobs(fixture.store.as_ref(), &channel).await.is_empty());
}

#[tokio::test]
async fn test_disabled_channel_is_skipped() {
    let fixture = TestFixture::new()
        .with_channel("1", entity_ids("p", 2))
        .with_disabled_channel("2", entity_ids("p", 2));
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    let report = orchestrator.sync_all(None).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.channels.len(), 2);
    synced(&report, &"1".into());
    assert!(matches!(
        report.outcome(&"2".into()),
        Some(ChannelOutcome::Skipped)
    ));
    assert!(jobs(fixture.store.as_ref(), &"2".into()).await.is_empty());
}

#[tokio::test]
async fn test_catalog_failure_on_channel_listing_is_an_error() {
    let fixture = TestFixture::new().with_channel("1", entity_ids("p", 2));
    let orchestrator = fixture.orchestrator(SyncConfig::default());
    fixture.catalog.set_failing(true);

    let result = orchestrator.sync_all(None).await;
    assert!(matches!(result, Err(SyncError::Catalog(_))));

    // With an explicit channel only that channel's step fails.
    let report = orchestrator.sync_all(Some(&"1".into())).await.unwrap();
    assert!(matches!(
        report.outcome(&"1".into()),
        Some(ChannelOutcome::Failed(SyncError::Catalog(_)))
    ));
}

/// A directory that cannot answer for one channel.
struct FlakyDirectory {
    broken: ChannelId,
}

#[async_trait]
impl ChannelDirectory for FlakyDirectory {
    async fn is_channel_sync_enabled(&self, channel: &ChannelId) -> anyhow::Result<bool> {
        if channel == &self.broken {
            anyhow::bail!("credential store offline");
        }
        Ok(true)
    }
}

#[tokio::test]
async fn test_failed_channel_does_not_stop_others() {
    let catalog = StaticCatalog::new()
        .with_channel("bad", entity_ids("p", 2))
        .with_channel("good", entity_ids("p", 2));
    let directory = FlakyDirectory {
        broken: "bad".into(),
    };
    let orchestrator =
        SyncOrchestrator::new(MemoryStore::new(), catalog, directory, SyncConfig::default())
            .unwrap();

    let report = orchestrator.sync_all(None).await.unwrap();
    assert_eq!(report.failed_channels(), vec![&ChannelId::from("bad")]);
    assert!(matches!(
        report.outcome(&"bad".into()),
        Some(ChannelOutcome::Failed(SyncError::ChannelDirectory { .. }))
    ));
    synced(&report, &"good".into());
    assert_eq!(report.jobs_created(), 1);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = SyncOrchestrator::new(
        MemoryStore::new(),
        StaticCatalog::new(),
        FlakyDirectory {
            broken: "x".into(),
        },
        SyncConfig::default().with_max_batch_size(0),
    );
    assert!(matches!(result, Err(SyncError::Core(_)) | Err(SyncError::Config(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_triggers_queue_each_entity_once() {
    let fixture = TestFixture::new().with_channel("1", entity_ids("p", 50));
    let channel = ChannelId::from("1");
    let orchestrator = Arc::new(fixture.orchestrator(SyncConfig::default().with_max_batch_size(20)));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        let channel = channel.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                orchestrator.sync_all(Some(&channel)).await
            } else {
                orchestrator
                    .sync_many(entity_ids("p", 10), Some(&channel))
                    .await
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_success());
    }

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    let mut seen: Vec<EntityId> = queued
        .iter()
        .flat_map(|job| job.payload.iter().cloned())
        .collect();
    assert!(queued.iter().all(|job| job.payload.len() <= 20));
    seen.sort();
    let mut expected = entity_ids("p", 50);
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_concurrent_single_triggers_do_not_duplicate() {
    let fixture = TestFixture::new().with_channel("1", Vec::new());
    let channel = ChannelId::from("1");
    let orchestrator = fixture.orchestrator(SyncConfig::default());

    let (first, second) = tokio::join!(
        orchestrator.sync_one("p1".into(), Some(&channel)),
        orchestrator.sync_one("p1".into(), Some(&channel)),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    let nothing = outcomes
        .iter()
        .filter(|report| matches!(report.outcome(&channel), Some(ChannelOutcome::NothingToSync)))
        .count();
    assert_eq!(nothing, 1);
    assert_eq!(jobs(fixture.store.as_ref(), &channel).await.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Full lifecycle on SQLite
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sqlite_lifecycle_with_dispatcher() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("sync.db")).unwrap();
    let fixture = TestFixture::with_store(store).with_channel("1", entity_ids("p", 3));
    let channel = ChannelId::from("1");
    let kind = JobKind::index_products();
    let orchestrator = fixture.orchestrator(SyncConfig::default());
    let dispatcher = JobDispatcher::new(fixture.store.clone());

    orchestrator
        .sync_one("p0".into(), Some(&channel))
        .await
        .unwrap();
    let report = orchestrator
        .sync_one("p1".into(), Some(&channel))
        .await
        .unwrap();
    let (_, merged, _) = synced(&report, &channel);
    assert!(merged.is_some());

    // Once claimed, the job no longer accepts merges.
    let claimed = dispatcher.claim_next(&kind, &channel).await.unwrap().unwrap();
    assert_eq!(payload_ids(&claimed), vec!["p0", "p1"]);
    let report = orchestrator
        .sync_one("p2".into(), Some(&channel))
        .await
        .unwrap();
    let (created, merged, _) = synced(&report, &channel);
    assert_eq!(created.len(), 1);
    assert_eq!(merged, None);

    // After acknowledgement the entities can be queued again.
    dispatcher.acknowledge(&claimed, 100).await.unwrap();
    let record = fixture
        .store
        .get_record(&"p0".into(), &channel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.last_synced_at, Some(100));
    assert!(!record.is_pending());

    let report = orchestrator
        .sync_many(entity_ids("p", 3), Some(&channel))
        .await
        .unwrap();
    let (created, merged, entities) = synced(&report, &channel);
    assert!(created.is_empty());
    assert_eq!(entities, 2);
    assert_eq!(merged.map(|id| id == claimed.id), Some(false));

    let queued = jobs(fixture.store.as_ref(), &channel).await;
    assert_eq!(queued.len(), 1);
    assert_eq!(payload_ids(&queued[0]), vec!["p0", "p1", "p2"]);
}
