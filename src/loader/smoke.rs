//! Small end-to-end check run before a full load.
//!
//! Clears the collection and writes a fixed, easy-to-recognise set of test
//! documents in a single ordered write, so setup problems (validator, TTL
//! index, connectivity) surface before millions of records are generated.

use crate::error::StoreError;
use crate::store::{InsertManyOptions, Store};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::info;

/// Documents written by [`smoke_load`].
pub const SMOKE_RECORDS: u64 = 1000;

/// What the smoke load observed.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    /// Documents removed before inserting
    pub cleared: u64,
    pub inserted: u64,
    /// Collection count after the insert
    pub total_count: u64,
    pub remove_at: DateTime<Utc>,
    pub sample: Option<Value>,
}

fn test_document(index: u64, remove_at: DateTime<Utc>, now: DateTime<Utc>) -> Value {
    json!({
        "remove_at": remove_at,
        "cardId": format!("test_card_{}", index),
        "action": "test_payment",
        "timestamp": now,
        "metadata": {
            "amount": 100.00,
            "currency": "USD",
            "merchant": "Test Store",
            "testIndex": index
        }
    })
}

/// Replaces the collection contents with [`SMOKE_RECORDS`] test documents
/// expiring `ttl_offset` from now.
pub async fn smoke_load(store: &dyn Store, ttl_offset: Duration) -> Result<SmokeReport, StoreError> {
    let now = Utc::now();
    let remove_at = now + ttl_offset;

    let cleared = store.delete_all().await?;
    info!(cleared = cleared, "Cleared existing documents");

    let documents = (1..=SMOKE_RECORDS)
        .map(|i| test_document(i, remove_at, now))
        .collect();
    let result = store
        .insert_many(documents, InsertManyOptions::ordered())
        .await?;

    let report = SmokeReport {
        cleared,
        inserted: result.inserted_count(),
        total_count: store.count_documents().await?,
        remove_at,
        sample: store.find_one().await?,
    };

    info!(
        inserted = report.inserted,
        total = report.total_count,
        "Smoke load finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::card_history_collection;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_smoke_load_replaces_contents() {
        let collection = card_history_collection().unwrap();
        collection
            .insert_documents(
                vec![json!({"remove_at": "2030-01-01T00:00:00Z"}); 3],
                false,
            )
            .unwrap();

        let report = assert_ok!(smoke_load(&collection, Duration::minutes(5)).await);

        assert_eq!(report.cleared, 3);
        assert_eq!(report.inserted, SMOKE_RECORDS);
        assert_eq!(report.total_count, SMOKE_RECORDS);

        let sample = report.sample.unwrap();
        assert_eq!(sample["cardId"], "test_card_1");
        assert_eq!(sample["action"], "test_payment");
        assert_eq!(sample["metadata"]["testIndex"], 1);
    }
}
