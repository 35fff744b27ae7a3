//! In-Memory Document Collection with TTL Indexes
//!
//! A thread-safe document collection that behaves like a single collection of
//! a document database: it assigns `_id`s, enforces an optional schema
//! validator, keeps index metadata, and computes an expiry deadline for each
//! document from its TTL indexes.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: documents are spread over shards by `_id`, each behind
//!    its own `RwLock`, so readers don't stall behind a large batch write.
//! 2. **Ordered Shards**: each shard is a `BTreeMap`, so the lowest `_id`s
//!    (natural insertion order) are cheap to find.
//! 3. **Sweep-Only Expiry**: an expired document stays visible until the
//!    sweeper removes it. There is no lazy expiry on read, which is how a
//!    real TTL monitor behaves and what the lifecycle monitor observes.
//! 4. **Serialized Bodies**: documents are stored as JSON `Bytes`; sizes in
//!    the stats are the real serialized sizes.

use super::{CollectionStats, DocumentId, IndexDescriptor, InsertManyOptions, InsertManyResult, Store};
use crate::error::{BulkWriteFailure, StoreError, WriteError, DOCUMENT_VALIDATION_FAILURE};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Number of shards for the collection.
const NUM_SHARDS: usize = 16;

/// Per-document allocation overhead added on top of the serialized size.
const DOCUMENT_OVERHEAD: u64 = 64;

/// Approximate bytes per index entry.
const INDEX_ENTRY_SIZE: u64 = 32;

/// Error code for a document that is not a JSON object or cannot be encoded.
const BAD_VALUE: i32 = 2;

/// Name of the implicit primary-key index.
pub const ID_INDEX_NAME: &str = "_id_";

/// A stored document with its computed expiry deadline.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: DocumentId,
    /// Serialized JSON body, `_id` included
    pub body: Bytes,
    /// Earliest TTL deadline (None = never expires)
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn decode(&self) -> Result<Value, StoreError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| StoreError::Backend(format!("corrupt document {}: {}", self.id, e)))
    }

    fn size(&self) -> u64 {
        self.body.len() as u64
    }
}

/// BSON-like type constraints understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// RFC 3339 timestamp string
    Date,
    String,
    Object,
    Number,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::Date => parse_date(value).is_some(),
            FieldType::String => value.is_string(),
            FieldType::Object => value.is_object(),
            FieldType::Number => value.is_number(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Object => "object",
            FieldType::Number => "number",
        }
    }
}

/// Required-field and field-type validator applied on every write.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    required: Vec<String>,
    properties: Vec<(String, FieldType)>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn property(mut self, field: impl Into<String>, kind: FieldType) -> Self {
        self.properties.push((field.into(), kind));
        self
    }

    pub fn validate(&self, document: &Map<String, Value>) -> Result<(), String> {
        for field in &self.required {
            match document.get(field) {
                Some(Value::Null) | None => {
                    return Err(format!(
                        "Document failed validation: missing required field '{}'",
                        field
                    ))
                }
                Some(_) => {}
            }
        }

        for (field, kind) in &self.properties {
            if let Some(value) = document.get(field) {
                if !kind.matches(value) {
                    return Err(format!(
                        "Document failed validation: field '{}' is not of type {}",
                        field,
                        kind.name()
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Parses a date-valued field.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[derive(Debug, Default)]
struct Shard {
    docs: RwLock<BTreeMap<DocumentId, StoredDocument>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A single document collection kept in memory.
///
/// Wrap it in an `Arc` to share it between the loader, the monitor and the
/// [`TtlSweeper`](super::TtlSweeper).
///
/// # Example
///
/// ```
/// use ttlload::store::{IndexDescriptor, MemoryCollection};
///
/// let collection = MemoryCollection::new("cardHistory");
/// collection
///     .create_index(IndexDescriptor::ttl("ttl_remove_at", "remove_at", 0))
///     .unwrap();
/// assert_eq!(collection.index_list().len(), 2);
/// ```
pub struct MemoryCollection {
    name: String,

    shards: Vec<Shard>,

    validator: Option<SchemaValidator>,

    indexes: RwLock<Vec<IndexDescriptor>>,

    /// Last `_id` handed out
    next_id: AtomicU64,

    /// Statistics: documents currently stored
    doc_count: AtomicU64,

    /// Statistics: serialized bytes currently stored
    data_bytes: AtomicU64,

    /// Statistics: documents removed by TTL sweeps
    expired_count: AtomicU64,
}

impl std::fmt::Debug for MemoryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("name", &self.name)
            .field("shards", &self.shards.len())
            .field("doc_count", &self.doc_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryCollection {
    /// Creates an empty collection carrying only the `_id_` index.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            validator: None,
            indexes: RwLock::new(vec![IndexDescriptor::new(ID_INDEX_NAME, "_id", 1)]),
            next_id: AtomicU64::new(0),
            doc_count: AtomicU64::new(0),
            data_bytes: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Creates an empty collection enforcing `validator` on every write.
    pub fn with_validator(name: impl Into<String>, validator: SchemaValidator) -> Self {
        Self {
            validator: Some(validator),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn shard(&self, id: DocumentId) -> &Shard {
        &self.shards[(id.0 as usize) % NUM_SHARDS]
    }

    /// Adds an index. TTL indexes must be single-field.
    ///
    /// Adding a TTL index recomputes the deadline of every stored document.
    pub fn create_index(&self, index: IndexDescriptor) -> Result<(), StoreError> {
        if index.key.is_empty() {
            return Err(StoreError::InvalidIndex(format!(
                "index '{}' has an empty key",
                index.name
            )));
        }
        if index.expire_after_seconds.is_some() && index.key.len() != 1 {
            return Err(StoreError::InvalidIndex(format!(
                "TTL index '{}' must cover exactly one field",
                index.name
            )));
        }

        let is_ttl = index.expire_after_seconds.is_some();
        {
            let mut indexes = write(&self.indexes);
            if let Some(existing) = indexes.iter().find(|i| i.name == index.name) {
                if *existing == index {
                    return Ok(());
                }
                return Err(StoreError::InvalidIndex(format!(
                    "index '{}' already exists with different options",
                    index.name
                )));
            }
            indexes.push(index);
        }

        if is_ttl {
            self.recompute_deadlines()?;
        }
        Ok(())
    }

    /// Snapshot of the index list.
    pub fn index_list(&self) -> Vec<IndexDescriptor> {
        read(&self.indexes).clone()
    }

    fn ttl_rules(&self) -> Vec<(String, u64)> {
        read(&self.indexes)
            .iter()
            .filter_map(|i| {
                let seconds = i.expire_after_seconds?;
                let (field, _) = i.key.first()?;
                Some((field.clone(), seconds))
            })
            .collect()
    }

    fn recompute_deadlines(&self) -> Result<(), StoreError> {
        let rules = self.ttl_rules();
        for shard in &self.shards {
            let mut docs = write(&shard.docs);
            for stored in docs.values_mut() {
                let document = stored.decode()?;
                stored.expires_at = deadline(&document, &rules);
            }
        }
        Ok(())
    }

    /// Writes documents, assigning `_id`s.
    ///
    /// Rejected documents are collected as [`WriteError`]s; with
    /// `ordered = true` the first rejection stops the batch.
    pub fn insert_documents(
        &self,
        documents: Vec<Value>,
        ordered: bool,
    ) -> Result<InsertManyResult, StoreError> {
        let rules = self.ttl_rules();
        let mut inserted_ids = Vec::with_capacity(documents.len());
        let mut write_errors = Vec::new();

        for (index, document) in documents.into_iter().enumerate() {
            match self.insert_one(document, &rules) {
                Ok(id) => inserted_ids.push(id),
                Err((code, message)) => {
                    write_errors.push(WriteError {
                        index,
                        code,
                        message,
                    });
                    if ordered {
                        break;
                    }
                }
            }
        }

        if write_errors.is_empty() {
            return Ok(InsertManyResult { inserted_ids });
        }

        debug!(
            collection = %self.name,
            inserted = inserted_ids.len(),
            failed = write_errors.len(),
            "Bulk write finished with errors"
        );

        Err(StoreError::BulkWrite(BulkWriteFailure {
            inserted_count: inserted_ids.len() as u64,
            write_errors,
        }))
    }

    fn insert_one(&self, document: Value, rules: &[(String, u64)]) -> Result<DocumentId, (i32, String)> {
        let Value::Object(mut fields) = document else {
            return Err((BAD_VALUE, "document must be an object".to_string()));
        };

        if let Some(validator) = &self.validator {
            validator
                .validate(&fields)
                .map_err(|message| (DOCUMENT_VALIDATION_FAILURE, message))?;
        }

        let id = DocumentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        fields.insert("_id".to_string(), Value::from(id.0));
        let document = Value::Object(fields);

        let expires_at = deadline(&document, rules);
        let body = serde_json::to_vec(&document)
            .map(Bytes::from)
            .map_err(|e| (BAD_VALUE, format!("failed to encode document: {}", e)))?;

        let stored = StoredDocument {
            id,
            body,
            expires_at,
        };
        let size = stored.size();

        // Counters only change while the shard lock is held
        let mut docs = write(&self.shard(id).docs);
        docs.insert(id, stored);
        self.doc_count.fetch_add(1, Ordering::Relaxed);
        self.data_bytes.fetch_add(size, Ordering::Relaxed);

        Ok(id)
    }

    /// The `limit` lowest-`_id` documents, decoded.
    pub fn first_documents(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<StoredDocument> = Vec::new();
        for shard in &self.shards {
            let docs = read(&shard.docs);
            candidates.extend(docs.values().take(limit).cloned());
        }
        candidates.sort_by_key(|d| d.id);
        candidates.truncate(limit);

        candidates.iter().map(StoredDocument::decode).collect()
    }

    /// Gets a stored document by `_id`.
    pub fn get(&self, id: DocumentId) -> Option<StoredDocument> {
        read(&self.shard(id).docs).get(&id).cloned()
    }

    /// Removes every document whose TTL deadline is at or before `now`.
    ///
    /// This is called by the [`TtlSweeper`](super::TtlSweeper).
    ///
    /// # Returns
    ///
    /// Returns the number of documents removed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> u64 {
        let mut removed = 0u64;

        for shard in &self.shards {
            let mut docs = write(&shard.docs);
            let mut shard_removed = 0u64;
            let mut shard_bytes = 0u64;
            docs.retain(|_, stored| {
                if stored.is_expired(now) {
                    shard_removed += 1;
                    shard_bytes += stored.size();
                    false
                } else {
                    true
                }
            });

            if shard_removed > 0 {
                self.release(shard_removed, shard_bytes);
                self.expired_count.fetch_add(shard_removed, Ordering::Relaxed);
                removed += shard_removed;
            }
        }

        removed
    }

    /// Removes every document.
    pub fn clear(&self) -> u64 {
        let mut removed = 0u64;
        for shard in &self.shards {
            let mut docs = write(&shard.docs);
            let count = docs.len() as u64;
            let bytes = docs.values().map(StoredDocument::size).sum();
            docs.clear();
            self.release(count, bytes);
            removed += count;
        }
        removed
    }

    /// Subtracts removed documents from the counters. Callers hold the
    /// write lock of the shard the documents came from.
    fn release(&self, count: u64, bytes: u64) {
        self.doc_count.fetch_sub(count, Ordering::Relaxed);
        self.data_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> u64 {
        self.doc_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total documents removed by TTL sweeps so far.
    pub fn expired_count(&self) -> u64 {
        self.expired_count.load(Ordering::Relaxed)
    }

    pub fn collection_stats(&self) -> CollectionStats {
        let count = self.len();
        let size = self.data_bytes.load(Ordering::Relaxed);
        let nindexes = read(&self.indexes).len() as u64;

        CollectionStats {
            count,
            size,
            storage_size: size + count * DOCUMENT_OVERHEAD,
            avg_obj_size: if count > 0 { size / count } else { 0 },
            nindexes,
            total_index_size: nindexes * count * INDEX_ENTRY_SIZE,
        }
    }
}

/// Earliest `field + expireAfterSeconds` over all TTL rules whose field holds a date.
fn deadline(document: &Value, rules: &[(String, u64)]) -> Option<DateTime<Utc>> {
    rules
        .iter()
        .filter_map(|(field, seconds)| {
            let at = parse_date(document.get(field)?)?;
            let seconds = Duration::try_seconds(i64::try_from(*seconds).ok()?)?;
            at.checked_add_signed(seconds)
        })
        .min()
}

#[async_trait]
impl Store for MemoryCollection {
    async fn insert_many(
        &self,
        documents: Vec<Value>,
        options: InsertManyOptions,
    ) -> Result<InsertManyResult, StoreError> {
        self.insert_documents(documents, options.ordered)
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        Ok(self.len())
    }

    async fn find_one(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.first_documents(1)?.into_iter().next())
    }

    async fn find(&self, limit: usize) -> Result<Vec<Value>, StoreError> {
        self.first_documents(limit)
    }

    async fn indexes(&self) -> Result<Vec<IndexDescriptor>, StoreError> {
        Ok(self.index_list())
    }

    async fn stats(&self) -> Result<CollectionStats, StoreError> {
        Ok(self.collection_stats())
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        Ok(self.clear())
    }
}
