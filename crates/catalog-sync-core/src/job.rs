//! Queued jobs and their payloads.
//!
//! A [`Job`] is one batch of entity ids waiting to be transmitted to the
//! search index by an out-of-process worker. Its [`JobPayload`] is an
//! ordered set: no id appears twice, and the serialized form is stable
//! under repeated merges.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{ChannelId, EntityId, JobId, JobKind};

/// Ordered set of entity ids carried by a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPayload {
    ids: Vec<EntityId>,
}

/// Wire shape of a payload as stored in the queue.
#[derive(Serialize, Deserialize)]
struct PayloadDocument {
    products: Vec<EntityId>,
}

impl JobPayload {
    /// Build a payload from ids that must already be unique.
    ///
    /// Order is kept as given.
    pub fn from_unique(ids: Vec<EntityId>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id) {
                return Err(CoreError::DuplicateEntity(id.clone()));
            }
        }
        Ok(Self { ids })
    }

    /// Build a payload from a sorted, deduplicated set.
    pub(crate) fn from_sorted_set(ids: std::collections::BTreeSet<EntityId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Number of ids in the payload.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether the payload contains the given id.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    /// Iterate ids in payload order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }

    /// Borrow the ids as a slice.
    pub fn as_slice(&self) -> &[EntityId] {
        &self.ids
    }

    /// Serialize to the queue's JSON document: `{"products": [...]}`.
    pub fn to_json(&self) -> Result<String> {
        let doc = PayloadDocument {
            products: self.ids.clone(),
        };
        serde_json::to_string(&doc).map_err(|e| CoreError::Payload(e.to_string()))
    }

    /// Parse a stored JSON document back into a payload.
    ///
    /// Rejects documents carrying duplicate ids.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: PayloadDocument =
            serde_json::from_str(json).map_err(|e| CoreError::Payload(e.to_string()))?;
        Self::from_unique(doc.products)
    }
}

impl IntoIterator for JobPayload {
    type Item = EntityId;
    type IntoIter = std::vec::IntoIter<EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

/// A queued unit of work: one batch of ids for one (kind, channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Store-assigned id.
    pub id: JobId,
    /// The worker this job is addressed to.
    pub kind: JobKind,
    /// The channel whose index the batch belongs to.
    pub channel: ChannelId,
    /// The ids to transmit.
    pub payload: JobPayload,
    /// Set by the worker before it starts transmitting. Immutable afterwards.
    pub dispatched: bool,
    /// Creation time (Unix ms).
    pub created_at: i64,
}

impl Job {
    /// Whether this job can still be edited in place.
    pub fn is_pending(&self) -> bool {
        !self.dispatched
    }
}
