//! Batch planning: chunking candidates and merging into pending jobs.
//!
//! Planning is pure and deterministic. Batch `i` holds the candidates at
//! positions `[i * max, (i + 1) * max)`, so the same input always produces
//! the same jobs.
//!
//! Merging is only ever considered for a single-batch plan. A multi-batch
//! plan (a full resync, say) must never fold its first chunk into an
//! unrelated small pending job.

use std::collections::{BTreeSet, HashSet};

use crate::error::{CoreError, Result};
use crate::job::JobPayload;
use crate::types::EntityId;

/// Hard upper bound on ids per job accepted by the remote index.
pub const MAX_BATCH_SIZE_LIMIT: usize = 2000;

/// One planned batch of ids, in candidate order.
pub type Batch = Vec<EntityId>;

/// Outcome of trying to fold a batch into an existing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// The union fits. Payload is sorted.
    Merged(JobPayload),
    /// The union would exceed the batch size.
    Rejected,
}

/// Check a batch size against `1..=MAX_BATCH_SIZE_LIMIT`.
pub fn validate_batch_size(max_batch_size: usize) -> Result<()> {
    if max_batch_size == 0 || max_batch_size > MAX_BATCH_SIZE_LIMIT {
        return Err(CoreError::InvalidBatchSize(max_batch_size));
    }
    Ok(())
}

/// Drop repeated ids, keeping the first occurrence of each.
pub fn dedupe_preserving_order(ids: impl IntoIterator<Item = EntityId>) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Split `ids` into ordered batches of at most `max_batch_size`.
///
/// An empty input plans no batches.
pub fn plan(ids: &[EntityId], max_batch_size: usize) -> Result<Vec<Batch>> {
    validate_batch_size(max_batch_size)?;
    Ok(ids
        .chunks(max_batch_size)
        .map(|chunk| chunk.to_vec())
        .collect())
}

/// Union `incoming` into `existing` if the result fits in `max_batch_size`.
pub fn try_merge(existing: &JobPayload, incoming: &[EntityId], max_batch_size: usize) -> MergeResult {
    let mut union: BTreeSet<EntityId> = existing.iter().cloned().collect();
    union.extend(incoming.iter().cloned());

    if union.len() > max_batch_size {
        return MergeResult::Rejected;
    }
    MergeResult::Merged(JobPayload::from_sorted_set(union))
}
