//! Card History Records
//!
//! This module defines the synthetic document shape loaded into the
//! collection and the generator that produces it.
//!
//! ## Document Shape
//!
//! ```text
//! {
//!   remove_at:  date      <- shared by every record of a run, TTL key
//!   cardId:     string    <- "card_" + (1_000_000_000 + index)
//!   action:     string    <- one of ACTIONS
//!   timestamp:  date      <- now - uniform(0, 24h)
//!   metadata:   { amount, currency, merchant, location, paymentMethod,
//!                 transaction, device, additionalData }
//! }
//! ```
//!
//! The metadata block is intentionally verbose so each serialized record
//! lands around 1 KB.

pub mod generator;

pub use generator::RecordGenerator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment lifecycle events a record can describe.
pub const ACTIONS: &[&str] = &[
    "payment_processed",
    "card_blocked",
    "card_unblocked",
    "payment_failed",
    "refund_issued",
    "chargeback_received",
    "fraud_detected",
    "limit_exceeded",
    "authorization_approved",
    "authorization_declined",
];

pub const MERCHANTS: &[&str] = &[
    "Amazon",
    "Walmart",
    "Target",
    "Starbucks",
    "McDonald's",
    "Apple Store",
    "Google Play",
    "Netflix",
    "Spotify",
    "Uber",
    "Lyft",
    "Airbnb",
];

pub const CITIES: &[&str] = &[
    "New York",
    "Los Angeles",
    "Chicago",
    "Houston",
    "Phoenix",
    "Philadelphia",
    "San Antonio",
    "San Diego",
    "Dallas",
    "San Jose",
    "Austin",
    "Jacksonville",
];

/// Lower bound of generated amounts.
pub const MIN_AMOUNT: f64 = 10.0;

/// Upper bound of generated amounts (after rounding).
pub const MAX_AMOUNT: f64 = 510.0;

/// Offset added to the record index to build card ids.
pub const CARD_ID_BASE: u64 = 1_000_000_000;

/// One synthetic card-history document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "remove_at")]
    pub remove_at: DateTime<Utc>,
    pub card_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Record {
    /// Converts the record into a store document.
    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub location: Location,
    pub payment_method: PaymentMethod,
    pub transaction: Transaction,
    pub device: Device,
    pub additional_data: AdditionalData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub kind: String,
    pub last4: String,
    pub brand: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub status: String,
    pub auth_code: String,
    pub processing_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: String,
    pub os: String,
    pub version: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    pub notes: String,
    pub tags: Vec<String>,
    pub internal_ref: String,
    pub processing_node: String,
    pub api_version: String,
    pub batch_id: u64,
}
