//! Lifecycle report types and their console rendering.

use crate::store::{CollectionStats, IndexDescriptor};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// A TTL index as read from the store's index metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlIndexDescriptor {
    pub name: String,
    pub field: String,
    pub direction: i32,
    pub expire_after_seconds: u64,
}

impl TtlIndexDescriptor {
    /// `None` for indexes without an expiration setting.
    pub fn from_index(index: &IndexDescriptor) -> Option<Self> {
        let expire_after_seconds = index.expire_after_seconds?;
        let (field, direction) = index.key.first()?;
        Some(Self {
            name: index.name.clone(),
            field: field.clone(),
            direction: *direction,
            expire_after_seconds,
        })
    }

    /// When a document whose indexed field holds `field_value` becomes removable.
    pub fn eligible_at(&self, field_value: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.expire_after_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delay| field_value.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// `field_value + expireAfterSeconds <= now`.
    pub fn is_eligible(&self, field_value: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.eligible_at(field_value) <= now
    }

    pub fn key_json(&self) -> String {
        let mut key = serde_json::Map::new();
        key.insert(self.field.clone(), self.direction.into());
        serde_json::Value::Object(key).to_string()
    }
}

/// Where the sampled document stands relative to its expiration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpirationStatus {
    /// `remove_at` is still in the future
    Pending {
        remove_at: DateTime<Utc>,
        remaining: Duration,
        /// `remove_at` plus one sweep interval
        deletion_expected_around: DateTime<Utc>,
    },
    /// `remove_at` has been reached; removal waits on the next sweep
    Due {
        remove_at: DateTime<Utc>,
        overdue: Duration,
    },
}

impl ExpirationStatus {
    pub fn evaluate(remove_at: DateTime<Utc>, now: DateTime<Utc>, sweep_interval: Duration) -> Self {
        let delta = remove_at - now;
        if delta > chrono::Duration::zero() {
            let sweep = chrono::Duration::from_std(sweep_interval).unwrap_or(chrono::Duration::zero());
            ExpirationStatus::Pending {
                remove_at,
                remaining: delta.to_std().unwrap_or_default(),
                deletion_expected_around: remove_at + sweep,
            }
        } else {
            ExpirationStatus::Due {
                remove_at,
                overdue: (-delta).to_std().unwrap_or_default(),
            }
        }
    }

    pub fn remove_at(&self) -> DateTime<Utc> {
        match self {
            ExpirationStatus::Pending { remove_at, .. } | ExpirationStatus::Due { remove_at, .. } => {
                *remove_at
            }
        }
    }

    pub fn is_due(&self) -> bool {
        matches!(self, ExpirationStatus::Due { .. })
    }
}

/// Why an inspection stopped before computing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoDataReason {
    EmptyCollection,
    /// The sampled document has no date in the TTL field
    MissingExpirationField { field: String },
    /// The sample could not be read at all
    ReadFailed(String),
}

/// Everything read from a collection that has data.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub expiration: ExpirationStatus,
    /// Live count at the time of the call
    pub document_count: Option<u64>,
    pub ttl_indexes: Vec<TtlIndexDescriptor>,
    pub stats: Option<CollectionStats>,
    /// Reads that failed; the report is partial but still rendered
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Findings {
    NoData(NoDataReason),
    Inspected(Inspection),
}

/// A point-in-time view of a collection's expiration lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub checked_at: DateTime<Utc>,
    pub sweep_interval: Duration,
    pub findings: Findings,
}

impl LifecycleReport {
    pub fn is_no_data(&self) -> bool {
        matches!(self.findings, Findings::NoData(_))
    }

    pub fn inspection(&self) -> Option<&Inspection> {
        match &self.findings {
            Findings::Inspected(inspection) => Some(inspection),
            Findings::NoData(_) => None,
        }
    }

    /// True once nothing is left for the sweeper to remove.
    pub fn is_drained(&self) -> bool {
        match &self.findings {
            Findings::NoData(NoDataReason::EmptyCollection) => true,
            Findings::Inspected(inspection) => inspection.document_count == Some(0),
            Findings::NoData(_) => false,
        }
    }
}

const RULE: &str = "==================================================";

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TTL Deletion Monitoring")?;
        writeln!(f, "{}", RULE)?;

        let inspection = match &self.findings {
            Findings::NoData(reason) => {
                return match reason {
                    NoDataReason::EmptyCollection => write!(f, "No documents found"),
                    NoDataReason::MissingExpirationField { field } => {
                        write!(f, "No documents found or missing {} field", field)
                    }
                    NoDataReason::ReadFailed(message) => {
                        write!(f, "Could not read a sample document: {}", message)
                    }
                };
            }
            Findings::Inspected(inspection) => inspection,
        };

        let sweep_secs = self.sweep_interval.as_secs();
        writeln!(f, "Current time: {}", self.checked_at.to_rfc3339())?;
        writeln!(
            f,
            "TTL expiration time: {}",
            inspection.expiration.remove_at().to_rfc3339()
        )?;

        match &inspection.expiration {
            ExpirationStatus::Pending {
                remaining,
                deletion_expected_around,
                ..
            } => {
                let secs = remaining.as_secs();
                writeln!(
                    f,
                    "Time until expiration: {} minutes {} seconds",
                    secs / 60,
                    secs % 60
                )?;
                writeln!(
                    f,
                    "Documents will start being deleted around: {}",
                    deletion_expected_around.to_rfc3339()
                )?;
            }
            ExpirationStatus::Due { .. } => {
                writeln!(
                    f,
                    "Expiration already due: documents should be expiring now (TTL background task runs every ~{} seconds)",
                    sweep_secs
                )?;
            }
        }

        match inspection.document_count {
            Some(count) => writeln!(f, "Current document count: {}", count)?,
            None => writeln!(f, "Current document count: unavailable")?,
        }

        writeln!(f)?;
        writeln!(f, "TTL Index Information:")?;
        if inspection.ttl_indexes.is_empty() {
            writeln!(f, "- No TTL index found")?;
        }
        for index in &inspection.ttl_indexes {
            writeln!(f, "- Index name: {}", index.name)?;
            writeln!(f, "- Index key: {}", index.key_json())?;
            writeln!(f, "- expireAfterSeconds: {}", index.expire_after_seconds)?;
            writeln!(
                f,
                "- TTL behavior: Documents expire when the indexed field value + expireAfterSeconds is reached"
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Collection Stats:")?;
        match &inspection.stats {
            Some(stats) => {
                writeln!(
                    f,
                    "- Storage size: {:.2} MB",
                    stats.storage_size as f64 / 1024.0 / 1024.0
                )?;
                writeln!(f, "- Average document size: {} bytes", stats.avg_obj_size)?;
                writeln!(f, "- Total indexes: {}", stats.nindexes)?;
            }
            None => writeln!(f, "- unavailable")?,
        }

        for problem in &inspection.degraded {
            writeln!(f, "- warning: {}", problem)?;
        }

        writeln!(f)?;
        writeln!(f, "TTL Deletion Facts:")?;
        writeln!(
            f,
            "- The TTL background task runs approximately every {} seconds",
            sweep_secs
        )?;
        writeln!(
            f,
            "- Deletion may take time depending on collection size and server load"
        )?;
        write!(f, "- Large collections may take several minutes to fully clear")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_ttl_descriptor_from_index() {
        assert!(TtlIndexDescriptor::from_index(&IndexDescriptor::new("_id_", "_id", 1)).is_none());

        let ttl = TtlIndexDescriptor::from_index(&IndexDescriptor::ttl("ttl_remove_at", "remove_at", 0))
            .unwrap();
        assert_eq!(ttl.field, "remove_at");
        assert_eq!(ttl.key_json(), r#"{"remove_at":1}"#);

        let quoted = TtlIndexDescriptor {
            field: "odd\"field".into(),
            direction: -1,
            ..ttl
        };
        assert_eq!(quoted.key_json(), r#"{"odd\"field":-1}"#);
    }

    #[test]
    fn test_eligibility_rule() {
        let ttl = TtlIndexDescriptor::from_index(&IndexDescriptor::ttl("delayed", "remove_at", 3600))
            .unwrap();
        let value = at("2026-03-01T10:00:00Z");

        assert_eq!(ttl.eligible_at(value), at("2026-03-01T11:00:00Z"));
        assert!(!ttl.is_eligible(value, at("2026-03-01T10:59:59Z")));
        assert!(ttl.is_eligible(value, at("2026-03-01T11:00:00Z")));
    }

    #[test]
    fn test_evaluate_pending_and_due() {
        let now = at("2026-03-01T10:00:00Z");
        let sweep = Duration::from_secs(60);

        let pending = ExpirationStatus::evaluate(at("2026-03-01T10:02:30Z"), now, sweep);
        assert_eq!(
            pending,
            ExpirationStatus::Pending {
                remove_at: at("2026-03-01T10:02:30Z"),
                remaining: Duration::from_secs(150),
                deletion_expected_around: at("2026-03-01T10:03:30Z"),
            }
        );

        let due = ExpirationStatus::evaluate(at("2026-03-01T09:59:55Z"), now, sweep);
        assert!(due.is_due());

        // Exactly at the deadline counts as due
        assert!(ExpirationStatus::evaluate(now, now, sweep).is_due());
    }

    #[test]
    fn test_render_no_data() {
        let report = LifecycleReport {
            checked_at: at("2026-03-01T10:00:00Z"),
            sweep_interval: Duration::from_secs(60),
            findings: Findings::NoData(NoDataReason::MissingExpirationField {
                field: "remove_at".into(),
            }),
        };
        let text = report.to_string();
        assert!(text.ends_with("No documents found or missing remove_at field"));
        assert!(!text.contains("Collection Stats"));
    }

    #[test]
    fn test_render_pending() {
        let now = at("2026-03-01T10:00:00Z");
        let report = LifecycleReport {
            checked_at: now,
            sweep_interval: Duration::from_secs(60),
            findings: Findings::Inspected(Inspection {
                expiration: ExpirationStatus::evaluate(
                    at("2026-03-01T10:02:30Z"),
                    now,
                    Duration::from_secs(60),
                ),
                document_count: Some(2500),
                ttl_indexes: vec![TtlIndexDescriptor {
                    name: "ttl_remove_at".into(),
                    field: "remove_at".into(),
                    direction: 1,
                    expire_after_seconds: 0,
                }],
                stats: Some(CollectionStats {
                    count: 2500,
                    size: 2_500_000,
                    storage_size: 3 * 1024 * 1024,
                    avg_obj_size: 1000,
                    nindexes: 2,
                    total_index_size: 0,
                }),
                degraded: vec![],
            }),
        };

        let text = report.to_string();
        assert!(text.contains("Time until expiration: 2 minutes 30 seconds"));
        assert!(text.contains("deleted around: 2026-03-01T10:03:30+00:00"));
        assert!(text.contains("Current document count: 2500"));
        assert!(text.contains("- Index key: {\"remove_at\":1}"));
        assert!(text.contains("- Storage size: 3.00 MB"));
        assert!(text.contains("- Average document size: 1000 bytes"));
        assert!(text.contains("- Total indexes: 2"));
    }
}
