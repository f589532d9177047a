//! Property tests over arbitrary trigger sequences.

use std::collections::BTreeSet;

use catalog_sync::store::{JobStore, SyncLedger};
use catalog_sync::{ChannelId, EntityId, JobKind, SyncConfig};
use catalog_sync_testkit::generators::{batch_size, entity_id_list};
use catalog_sync_testkit::TestFixture;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Without a dispatcher, every triggered id ends up in exactly one job,
    /// no job exceeds the batch size, and every queued id is pending.
    #[test]
    fn test_each_entity_queued_once(
        triggers in prop::collection::vec(entity_id_list(24), 1..8),
        max_batch_size in batch_size(),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let channel = ChannelId::from("1");
            let fixture = TestFixture::new().with_channel("1", Vec::new());
            let orchestrator =
                fixture.orchestrator(SyncConfig::default().with_max_batch_size(max_batch_size));

            for ids in &triggers {
                let report = orchestrator.sync_many(ids.clone(), Some(&channel)).await.unwrap();
                prop_assert!(report.is_success());
            }

            let jobs = fixture
                .store
                .list_jobs(&JobKind::index_products(), &channel)
                .await
                .unwrap();

            let mut queued = Vec::new();
            for job in &jobs {
                prop_assert!(!job.payload.is_empty());
                prop_assert!(job.payload.len() <= max_batch_size);
                queued.extend(job.payload.iter().cloned());
            }
            let unique: BTreeSet<EntityId> = queued.iter().cloned().collect();
            prop_assert_eq!(unique.len(), queued.len());

            let expected: BTreeSet<EntityId> = triggers.iter().flatten().cloned().collect();
            prop_assert_eq!(&unique, &expected);

            for id in &unique {
                let record = fixture.store.get_record(id, &channel).await.unwrap();
                prop_assert!(record.is_some_and(|record| record.is_pending()));
            }
            Ok(())
        })?;
    }

    /// A full resync never touches a job that already exists.
    #[test]
    fn test_full_resync_never_edits(
        catalog in entity_id_list(60),
        seeded in entity_id_list(10),
        max_batch_size in batch_size(),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let channel = ChannelId::from("1");
            let fixture = TestFixture::new().with_channel("1", catalog.clone());
            let orchestrator =
                fixture.orchestrator(SyncConfig::default().with_max_batch_size(max_batch_size));

            let before = match orchestrator.sync_many(seeded, Some(&channel)).await.unwrap()
                .outcome(&channel)
            {
                Some(catalog_sync::ChannelOutcome::Synced { .. }) => fixture
                    .store
                    .list_jobs(&JobKind::index_products(), &channel)
                    .await
                    .unwrap(),
                _ => Vec::new(),
            };

            orchestrator.sync_all(Some(&channel)).await.unwrap();

            for job in &before {
                let after = fixture.store.get_job(job.id).await.unwrap().unwrap();
                prop_assert_eq!(&after.payload, &job.payload);
            }
            Ok(())
        })?;
    }
}
