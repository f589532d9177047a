//! Host-side collaborators: the catalog and the channel directory.
//!
//! The orchestrator never reads host state directly. It asks a
//! [`CatalogSource`] which channels and entities exist and a
//! [`ChannelDirectory`] whether a channel may be synced at all.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync_core::{ChannelId, EntityId};
use serde::{Deserialize, Serialize};

/// The host catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every entity currently known for `channel`, in catalog order.
    async fn list_all_entity_ids(&self, channel: &ChannelId) -> anyhow::Result<Vec<EntityId>>;

    /// Every channel the host currently runs.
    async fn list_active_channels(&self) -> anyhow::Result<Vec<ChannelId>>;
}

/// Per-channel sync switch, usually backed by credentials.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Whether `channel` has what it needs to talk to the search index.
    async fn is_channel_sync_enabled(&self, channel: &ChannelId) -> anyhow::Result<bool>;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    async fn list_all_entity_ids(&self, channel: &ChannelId) -> anyhow::Result<Vec<EntityId>> {
        (**self).list_all_entity_ids(channel).await
    }

    async fn list_active_channels(&self) -> anyhow::Result<Vec<ChannelId>> {
        (**self).list_active_channels().await
    }
}

#[async_trait]
impl<T: ChannelDirectory + ?Sized> ChannelDirectory for Arc<T> {
    async fn is_channel_sync_enabled(&self, channel: &ChannelId) -> anyhow::Result<bool> {
        (**self).is_channel_sync_enabled(channel).await
    }
}

/// Credentials a channel needs for the remote search index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCredentials {
    pub store_id: String,
    pub store_secret: String,
    pub api_key: String,
}

impl ChannelCredentials {
    /// All three values are present once surrounding whitespace is trimmed.
    pub fn is_complete(&self) -> bool {
        [&self.store_id, &self.store_secret, &self.api_key]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

/// A channel directory backed by a fixed credential table.
///
/// Channels without an entry, or with any blank credential, are disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticChannelDirectory {
    credentials: HashMap<ChannelId, ChannelCredentials>,
}

impl StaticChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a channel's credentials.
    pub fn with_channel(mut self, channel: impl Into<ChannelId>, credentials: ChannelCredentials) -> Self {
        self.credentials.insert(channel.into(), credentials);
        self
    }

    /// Channels with complete credentials, sorted.
    pub fn enabled_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self
            .credentials
            .iter()
            .filter(|(_, creds)| creds.is_complete())
            .map(|(channel, _)| channel.clone())
            .collect();
        channels.sort();
        channels
    }
}

#[async_trait]
impl ChannelDirectory for StaticChannelDirectory {
    async fn is_channel_sync_enabled(&self, channel: &ChannelId) -> anyhow::Result<bool> {
        Ok(self
            .credentials
            .get(channel)
            .is_some_and(ChannelCredentials::is_complete))
    }
}
