//! Synthetic record generation.
//!
//! Every record has the same field set; only values vary. All randomness
//! flows through one `Rng`, so a seeded generator replays the same sequence.

use super::{
    AdditionalData, Coordinates, Device, Location, Metadata, PaymentMethod, Record, Transaction,
    ACTIONS, CARD_ID_BASE, CITIES, MERCHANTS, MIN_AMOUNT,
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Width of the event-time look-back window.
const LOOKBACK_MS: i64 = 24 * 60 * 60 * 1000;

/// Width of the amount range before the `MIN_AMOUNT` offset.
const AMOUNT_SPAN: f64 = 500.0;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

const ORIGIN_LAT: f64 = 37.7749;
const ORIGIN_LNG: f64 = -122.4194;

/// Produces card-history records.
///
/// `anchor` is the reference "now" used for event timestamps; the loader
/// pins it to the run start.
#[derive(Debug)]
pub struct RecordGenerator<R = StdRng> {
    rng: R,
    anchor: DateTime<Utc>,
    batch_size: u64,
}

impl RecordGenerator<StdRng> {
    /// A reproducible generator.
    pub fn seeded(seed: u64, anchor: DateTime<Utc>, batch_size: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), anchor, batch_size)
    }

    /// A generator seeded from OS entropy.
    pub fn from_entropy(anchor: DateTime<Utc>, batch_size: u64) -> Self {
        Self::with_rng(StdRng::from_entropy(), anchor, batch_size)
    }
}

impl<R: Rng> RecordGenerator<R> {
    pub fn with_rng(rng: R, anchor: DateTime<Utc>, batch_size: u64) -> Self {
        Self {
            rng,
            anchor,
            batch_size: batch_size.max(1),
        }
    }

    /// Builds the record for 1-based `index`.
    pub fn generate(&mut self, index: u64, remove_at: DateTime<Utc>) -> Record {
        let action = self.pick(ACTIONS);
        let merchant = self.pick(MERCHANTS);
        let city = self.pick(CITIES);
        let store_number = self.rng.gen_range(1..=999);

        let lookback = self.rng.gen_range(0..LOOKBACK_MS);
        let timestamp = self.anchor - Duration::milliseconds(lookback);

        let metadata = Metadata {
            amount: self.amount(),
            currency: "USD".to_string(),
            merchant: format!("{} Store #{}", merchant, store_number),
            location: Location {
                city: city.to_string(),
                state: "CA".to_string(),
                country: "USA".to_string(),
                coordinates: Coordinates {
                    lat: ORIGIN_LAT + (self.rng.gen::<f64>() - 0.5) * 2.0,
                    lng: ORIGIN_LNG + (self.rng.gen::<f64>() - 0.5) * 2.0,
                },
            },
            payment_method: PaymentMethod {
                kind: self.either("credit", "debit", 0.5),
                last4: format!("{:04}", self.rng.gen_range(0..10_000)),
                brand: self.either("visa", "mastercard", 0.5),
            },
            transaction: Transaction {
                id: format!("txn_{}", self.token(12)),
                status: self.either("completed", "failed", 0.9),
                auth_code: format!("AUTH{}", self.rng.gen_range(0..1000)),
                processing_time: self.rng.gen_range(100..1100),
            },
            device: Device {
                kind: "mobile".to_string(),
                os: "iOS".to_string(),
                version: "17.2".to_string(),
                user_agent: "YapeApp/2.1.0 (mobile; iOS 17.2; Scale/3.00)".to_string(),
            },
            additional_data: AdditionalData {
                notes: format!("Bulk inserted transaction #{}", index),
                tags: vec!["bulk_insert".to_string(), "test_data".to_string()],
                internal_ref: format!("BULK_{}_{}", index, self.token(6)),
                processing_node: "node-bulk-01".to_string(),
                api_version: "v2.1".to_string(),
                batch_id: index.saturating_sub(1) / self.batch_size + 1,
            },
        };

        Record {
            remove_at,
            card_id: format!("card_{}", CARD_ID_BASE + index),
            action: action.to_string(),
            timestamp,
            metadata,
        }
    }

    fn pick(&mut self, vocabulary: &[&'static str]) -> &'static str {
        vocabulary[self.rng.gen_range(0..vocabulary.len())]
    }

    /// `first` with probability `p`, otherwise `second`.
    fn either(&mut self, first: &str, second: &str, p: f64) -> String {
        if self.rng.gen_bool(p) {
            first.to_string()
        } else {
            second.to_string()
        }
    }

    fn amount(&mut self) -> f64 {
        let raw = self.rng.gen_range(0.0..AMOUNT_SPAN) + MIN_AMOUNT;
        (raw * 100.0).round() / 100.0
    }

    fn token(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| BASE36[self.rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }
}
