//! # ttlload - Bulk Loader and TTL Lifecycle Monitor
//!
//! ttlload generates large volumes of synthetic, schema-consistent card
//! history documents, loads them into a document collection in bounded
//! batches, and separately checks how the collection's TTL index expires
//! them. It exists to load-test a time-to-live deletion mechanism under
//! realistic document volume and shape.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               ttlload                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐                                     │
//! │  │   Record    │───>│ BulkLoader  │──── insert_many(ordered: false) ──┐ │
//! │  │  Generator  │    │ (run loop)  │                                   │ │
//! │  └─────────────┘    └─────────────┘                                   ▼ │
//! │                                              ┌──────────────────────────┐│
//! │  ┌─────────────┐   find_one / count /        │      dyn Store           ││
//! │  │  Lifecycle  │<── indexes / stats ─────────│  (MemoryCollection or    ││
//! │  │   Monitor   │                             │   any other backend)     ││
//! │  └─────────────┘                             └────────────┬─────────────┘│
//! │                                                           ▲              │
//! │                                              ┌────────────┴───────────┐  │
//! │                                              │       TtlSweeper       │  │
//! │                                              │ (Background Tokio Task)│  │
//! │                                              └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loader and the monitor share no in-process state. They meet only at
//! the collection: the loader writes documents, the monitor reads them back
//! along with the index metadata.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use ttlload::config::{LoadConfig, MonitorConfig};
//! use ttlload::loader::BulkLoader;
//! use ttlload::monitor::LifecycleMonitor;
//! use ttlload::store::card_history_collection;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(card_history_collection().unwrap());
//!
//! let config = LoadConfig::new(5_000, 1_000).unwrap();
//! let summary = BulkLoader::new(store.clone(), config).unwrap().run().await;
//! assert!(summary.is_complete());
//!
//! let report = LifecycleMonitor::new(store, MonitorConfig::default())
//!     .inspect()
//!     .await;
//! assert!(!report.is_no_data());
//! # });
//! ```
//!
//! ## Module Overview
//!
//! - [`record`]: document shape and the seedable record generator
//! - [`loader`]: batch planning, the insertion run loop, the smoke load
//! - [`monitor`]: read-only expiration lifecycle inspection
//! - [`store`]: the store trait, an in-memory collection, its TTL sweeper
//! - [`config`]: run configuration and defaults
//! - [`error`]: error types
//!
//! ## Failure Policy
//!
//! Batches are written with unordered semantics, so one bad document does not
//! sink the rest of its batch. If the store still raises an error for a
//! batch, the run stops there: the summary keeps everything inserted so far,
//! including the partial count of the failed batch, and no later batch is
//! attempted. Lost records are an accepted outcome of a load test.

pub mod config;
pub mod error;
pub mod loader;
pub mod monitor;
pub mod record;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{LoadConfig, MonitorConfig};
pub use error::{BatchSubmissionError, ConfigError, LoadError, StoreError};
pub use loader::{smoke_load, BulkLoader, InsertionSummary, ProgressReport};
pub use monitor::{LifecycleMonitor, LifecycleReport};
pub use record::{Record, RecordGenerator};
pub use store::{card_history_collection, start_ttl_sweeper, MemoryCollection, Store, TtlSweeper};

/// Version of ttlload
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
