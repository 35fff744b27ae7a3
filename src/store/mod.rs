//! Document Store Boundary
//!
//! The loader and the monitor talk to the persistent store only through the
//! [`Store`] trait. This module also ships an in-memory collection that
//! implements it, a TTL sweeper for that collection, and the provisioning
//! helpers that set up the `cardHistory` collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  insert_many   ┌──────────────────────────────────────┐
//! │  BulkLoader  │───────────────>│           MemoryCollection           │
//! └──────────────┘                │  ┌────────┐ ┌────────┐ ┌────────┐    │
//!                                 │  │Shard 0 │ │Shard 1 │ │...N    │    │
//! ┌──────────────┐  find_one      │  │RwLock  │ │RwLock  │ │shards  │    │
//! │   Lifecycle  │───────────────>│  └────────┘ └────────┘ └────────┘    │
//! │   Monitor    │  indexes/stats │  validator · _id_ · ttl_remove_at    │
//! └──────────────┘                └──────────────────────────────────────┘
//!                                                   ▲
//!                                                   │ cleanup_expired
//!                                       ┌───────────┴───────────┐
//!                                       │      TtlSweeper       │
//!                                       │ (Background Tokio Task)│
//!                                       └───────────────────────┘
//! ```

pub mod memory;
pub mod provision;
pub mod sweeper;

pub use memory::{MemoryCollection, SchemaValidator};
pub use provision::{card_history_collection, sample_document, COLLECTION_NAME, TTL_INDEX_NAME};
pub use sweeper::{start_ttl_sweeper, SweeperConfig, TtlSweeper};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier the store assigns to every written document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.0)
    }
}

/// Options for [`Store::insert_many`].
#[derive(Debug, Clone, Copy)]
pub struct InsertManyOptions {
    /// Stop at the first failing document when `true`
    pub ordered: bool,
}

impl InsertManyOptions {
    pub fn ordered() -> Self {
        Self { ordered: true }
    }

    pub fn unordered() -> Self {
        Self { ordered: false }
    }
}

impl Default for InsertManyOptions {
    fn default() -> Self {
        Self::ordered()
    }
}

/// Successful outcome of an `insert_many` call.
#[derive(Debug, Clone, Default)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<DocumentId>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> u64 {
        self.inserted_ids.len() as u64
    }
}

/// Index metadata as the store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    /// `(field, direction)` pairs
    pub key: Vec<(String, i32)>,
    /// Present only on TTL indexes
    pub expire_after_seconds: Option<u64>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, field: impl Into<String>, direction: i32) -> Self {
        Self {
            name: name.into(),
            key: vec![(field.into(), direction)],
            expire_after_seconds: None,
        }
    }

    pub fn ttl(name: impl Into<String>, field: impl Into<String>, expire_after_seconds: u64) -> Self {
        Self {
            expire_after_seconds: Some(expire_after_seconds),
            ..Self::new(name, field, 1)
        }
    }

    /// Renders the key the way a shell would print it: `{"remove_at":1}`.
    pub fn key_json(&self) -> String {
        let map: serde_json::Map<String, Value> = self
            .key
            .iter()
            .map(|(field, dir)| (field.clone(), Value::from(*dir)))
            .collect();
        Value::Object(map).to_string()
    }
}

/// Storage-level statistics, passed through verbatim by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Documents currently stored
    pub count: u64,
    /// Serialized size of all documents in bytes
    pub size: u64,
    /// Bytes allocated for document storage
    pub storage_size: u64,
    /// Average serialized document size in bytes
    pub avg_obj_size: u64,
    /// Number of indexes, `_id_` included
    pub nindexes: u64,
    /// Approximate bytes held by all indexes
    pub total_index_size: u64,
}

/// The persistent collection the loader writes to and the monitor reads from.
///
/// Implementations must be `Send + Sync` so one handle can be shared between
/// the loader, the monitor and any background task.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes a batch of documents.
    ///
    /// With `ordered: false` the store keeps going past failing documents and
    /// reports them together as [`StoreError::BulkWrite`], which carries the
    /// count of documents that did get written.
    async fn insert_many(
        &self,
        documents: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, StoreError>;

    /// Live document count.
    async fn count_documents(&self) -> Result<u64, StoreError>;

    /// Any one stored document.
    async fn find_one(&self) -> Result<Option<Value>, StoreError>;

    /// Up to `limit` stored documents in insertion order.
    async fn find(&self, limit: usize) -> Result<Vec<Value>, StoreError>;

    /// Every index on the collection.
    async fn indexes(&self) -> Result<Vec<IndexDescriptor>, StoreError>;

    async fn stats(&self) -> Result<CollectionStats, StoreError>;

    /// Removes every document, returning how many were removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_json() {
        let index = IndexDescriptor::ttl("ttl_remove_at", "remove_at", 0);
        assert_eq!(index.key_json(), r#"{"remove_at":1}"#);
        assert_eq!(index.expire_after_seconds, Some(0));
        assert_eq!(IndexDescriptor::new("_id_", "_id", 1).expire_after_seconds, None);
    }

    #[test]
    fn test_insert_options() {
        assert!(InsertManyOptions::default().ordered);
        assert!(!InsertManyOptions::unordered().ordered);
    }
}
