//! Collection provisioning for the card-history workload.
//!
//! Builds the validated collection and its TTL index. This runs once before
//! any load; the loader and monitor never create indexes themselves.

use super::memory::{FieldType, MemoryCollection, SchemaValidator};
use super::IndexDescriptor;
use crate::config::DEFAULT_TTL_FIELD;
use crate::error::StoreError;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::info;

pub const COLLECTION_NAME: &str = "cardHistory";

pub const TTL_INDEX_NAME: &str = "ttl_remove_at";

/// Validator requiring a date-typed `remove_at` on every document.
pub fn card_history_validator() -> SchemaValidator {
    SchemaValidator::new()
        .require(DEFAULT_TTL_FIELD)
        .property(DEFAULT_TTL_FIELD, FieldType::Date)
        .property("cardId", FieldType::String)
        .property("action", FieldType::String)
        .property("timestamp", FieldType::Date)
        .property("metadata", FieldType::Object)
}

/// Creates the `cardHistory` collection with its validator and the
/// `{remove_at: 1}` TTL index (`expireAfterSeconds: 0`, expire exactly at
/// the field's timestamp).
pub fn card_history_collection() -> Result<MemoryCollection, StoreError> {
    let collection = MemoryCollection::with_validator(COLLECTION_NAME, card_history_validator());
    collection.create_index(IndexDescriptor::ttl(TTL_INDEX_NAME, DEFAULT_TTL_FIELD, 0))?;

    info!(
        collection = COLLECTION_NAME,
        index = TTL_INDEX_NAME,
        "Collection created with TTL index"
    );

    Ok(collection)
}

/// A representative ~1 KB document expiring 24 hours after `now`.
pub fn sample_document(now: DateTime<Utc>) -> Value {
    let date = |d: DateTime<Utc>| d.to_rfc3339_opts(SecondsFormat::Millis, true);

    json!({
        "remove_at": date(now + Duration::hours(24)),
        "cardId": "card_123456789",
        "action": "payment_processed",
        "timestamp": date(now),
        "metadata": {
            "amount": 125.50,
            "currency": "USD",
            "merchant": "Sample Store Inc.",
            "location": {
                "city": "San Francisco",
                "state": "CA",
                "country": "USA",
                "coordinates": { "lat": 37.7749, "lng": -122.4194 }
            },
            "paymentMethod": { "type": "credit", "last4": "1234", "brand": "visa" },
            "transaction": {
                "id": "txn_987654321",
                "status": "completed",
                "authCode": "AUTH123",
                "processingTime": 450
            },
            "device": {
                "type": "mobile",
                "os": "iOS",
                "version": "15.6",
                "userAgent": "YapeApp/2.1.0 (iPhone; iOS 15.6; Scale/3.00)"
            },
            "riskAnalysis": {
                "score": 0.15,
                "factors": ["location_match", "device_trusted", "spending_pattern_normal"],
                "recommendations": ["approve"]
            },
            "additionalData": {
                "notes": "Regular customer transaction",
                "tags": ["mobile_payment", "verified_merchant", "low_risk"],
                "internalRef": "INT_REF_SAMPLE01",
                "processingNode": "node-sf-01",
                "apiVersion": "v2.1"
            }
        }
    })
}
