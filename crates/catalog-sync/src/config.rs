//! Orchestrator configuration.

use catalog_sync_core::{validate_batch_size, JobKind, MAX_BATCH_SIZE_LIMIT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Configuration for the sync orchestrator.
///
/// Fixed for the lifetime of an orchestrator, so every invocation plans
/// with one batch size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum ids per job. Between 1 and [`MAX_BATCH_SIZE_LIMIT`].
    pub max_batch_size: usize,
    /// Kind stamped on every job this orchestrator writes.
    pub job_kind: JobKind,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_BATCH_SIZE_LIMIT,
            job_kind: JobKind::index_products(),
        }
    }
}

impl SyncConfig {
    /// Set the batch size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the job kind.
    pub fn with_job_kind(mut self, kind: JobKind) -> Self {
        self.job_kind = kind;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        validate_batch_size(self.max_batch_size).map_err(|e| SyncError::Config(e.to_string()))?;
        if self.job_kind.as_str().trim().is_empty() {
            return Err(SyncError::Config("job kind must not be empty".into()));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        tracing::debug!(
            max_batch_size = config.max_batch_size,
            job_kind = %config.job_kind,
            "sync configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SyncConfig::default();
        assert_eq!(config.max_batch_size, 2000);
        assert_eq!(config.job_kind.as_str(), "index_products");
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SyncConfig::from_json(r#"{"max_batch_size": 500}"#).unwrap();
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.job_kind, JobKind::index_products());
    }

    #[test]
    fn test_rejects_out_of_range_batch_size() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"max_batch_size": 2001}"#),
            Err(SyncError::Config(_))
        ));
        assert!(SyncConfig::default().with_max_batch_size(0).validate().is_err());
    }

    #[test]
    fn test_rejects_blank_kind() {
        let config = SyncConfig::default().with_job_kind(JobKind::new("  "));
        assert!(config.validate().is_err());
    }
}
