//! Proptest generators for property-based testing.

use proptest::prelude::*;

use catalog_sync_core::{ChannelId, EntityId, JobPayload, MAX_BATCH_SIZE_LIMIT};

/// Generate an entity id drawn from a small space, so lists repeat often.
pub fn entity_id() -> impl Strategy<Value = EntityId> {
    (0u64..500).prop_map(EntityId::from)
}

/// Generate a channel id.
pub fn channel_id() -> impl Strategy<Value = ChannelId> {
    "[a-z][a-z0-9_]{0,11}".prop_map(ChannelId::from)
}

/// Generate a list of ids that may contain duplicates.
pub fn entity_id_list(max_len: usize) -> impl Strategy<Value = Vec<EntityId>> {
    prop::collection::vec(entity_id(), 0..=max_len)
}

/// Generate a list of distinct ids in arbitrary order.
pub fn unique_entity_ids(max_len: usize) -> impl Strategy<Value = Vec<EntityId>> {
    prop::collection::hash_set(entity_id(), 0..=max_len)
        .prop_map(|ids| ids.into_iter().collect())
}

/// Generate a non-empty job payload.
pub fn job_payload(max_len: usize) -> impl Strategy<Value = JobPayload> {
    prop::collection::btree_set(entity_id(), 1..=max_len.max(1)).prop_map(|ids| {
        JobPayload::from_unique(ids.into_iter().collect()).unwrap_or_default()
    })
}

/// Generate a batch size inside the accepted range, biased towards small
/// values so plans have several batches.
pub fn batch_size() -> impl Strategy<Value = usize> {
    prop_oneof![
        4 => 1usize..=16,
        1 => 17usize..=MAX_BATCH_SIZE_LIMIT,
    ]
}

/// Parameters for a single trigger against one channel.
#[derive(Debug, Clone)]
pub struct SyncParams {
    pub channel: ChannelId,
    pub ids: Vec<EntityId>,
    pub max_batch_size: usize,
}

impl Arbitrary for SyncParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (channel_id(), entity_id_list(64), 1usize..=16)
            .prop_map(|(channel, ids, max_batch_size)| SyncParams {
                channel,
                ids,
                max_batch_size,
            })
            .boxed()
    }
}
