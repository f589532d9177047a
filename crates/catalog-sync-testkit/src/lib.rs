//! # Catalog Sync Testkit
//!
//! Testing utilities for catalog sync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory catalog, a ready-made channel directory and
//!   store wrappers that inject failures or lose a race to another worker
//! - **Generators**: Proptest strategies for ids, payloads and triggers
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use catalog_sync_testkit::generators::SyncParams;
//!
//! proptest! {
//!     #[test]
//!     fn planning_never_fails(params: SyncParams) {
//!         let batches = catalog_sync_core::plan(&params.ids, params.max_batch_size);
//!         prop_assert!(batches.is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use catalog_sync::SyncConfig;
//! use catalog_sync_testkit::fixtures::{entity_ids, TestFixture};
//!
//! let fixture = TestFixture::new().with_channel("1", entity_ids("p", 10));
//! let orchestrator = fixture.orchestrator(SyncConfig::default());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    entity_ids, valid_credentials, ClaimRaceStore, DispatchRaceStore, FaultPlan, FaultyStore,
    StaticCatalog, TestFixture, TestOrchestrator,
};
pub use generators::SyncParams;
