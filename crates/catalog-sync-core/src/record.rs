//! Ledger records: per (entity, channel) sync state.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, EntityId};

/// Sync state of one entity in one channel.
///
/// There is at most one record per (entity, channel). A record is created
/// the first time a change for the entity is queued and is never deleted
/// by the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub entity: EntityId,
    pub channel: ChannelId,
    /// When the current change was queued (Unix ms). `None` once the worker
    /// has confirmed transmission.
    pub pending_since: Option<i64>,
    /// When the entity was last confirmed transmitted (Unix ms).
    pub last_synced_at: Option<i64>,
}

impl SyncRecord {
    /// A fresh record for a change queued at `now`.
    pub fn pending(entity: EntityId, channel: ChannelId, now: i64) -> Self {
        Self {
            entity,
            channel,
            pending_since: Some(now),
            last_synced_at: None,
        }
    }

    /// Whether a change for this entity is already queued.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Mark pending. Keeps the original timestamp if already pending.
    pub fn mark_pending(&mut self, now: i64) {
        if self.pending_since.is_none() {
            self.pending_since = Some(now);
        }
    }

    /// Record a confirmed transmission.
    pub fn mark_synced(&mut self, at: i64) {
        self.pending_since = None;
        self.last_synced_at = Some(at);
    }
}
