//! Expiration Lifecycle Monitor
//!
//! Read-only inspection of a collection whose documents carry a TTL field.
//! Each call samples one document, works out when it expires relative to
//! now, and gathers the live count, the TTL index settings and the storage
//! statistics the store exposes.
//!
//! ## Inspection Steps
//!
//! ```text
//! find_one ──> none / no date? ──> NoData (stop)
//!    │
//!    ▼
//! remove_at - now ──> Pending (remaining, remove_at + sweep) | Due
//!    │
//!    ▼
//! count_documents ──> indexes (TTL only) ──> stats
//! ```
//!
//! The monitor never writes and never fails: read errors degrade the report
//! instead of aborting it. Nothing is kept between calls.

pub mod report;

pub use report::{
    ExpirationStatus, Findings, Inspection, LifecycleReport, NoDataReason, TtlIndexDescriptor,
};

use crate::config::MonitorConfig;
use crate::store::memory::parse_date;
use crate::store::Store;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Inspects a collection's TTL lifecycle.
pub struct LifecycleMonitor {
    store: Arc<dyn Store>,
    config: MonitorConfig,
}

impl std::fmt::Debug for LifecycleMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleMonitor {
    pub fn new(store: Arc<dyn Store>, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    /// Inspects the collection as of now.
    pub async fn inspect(&self) -> LifecycleReport {
        self.inspect_at(Utc::now()).await
    }

    /// Inspects the collection, evaluating expiration against `now`.
    pub async fn inspect_at(&self, now: DateTime<Utc>) -> LifecycleReport {
        let findings = self.findings(now).await;
        LifecycleReport {
            checked_at: now,
            sweep_interval: self.config.sweep_interval,
            findings,
        }
    }

    async fn findings(&self, now: DateTime<Utc>) -> Findings {
        let field = &self.config.ttl_field;

        let sample = match self.store.find_one().await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                info!("No documents to inspect");
                return Findings::NoData(NoDataReason::EmptyCollection);
            }
            Err(e) => {
                warn!(error = %e, "Failed to read a sample document");
                return Findings::NoData(NoDataReason::ReadFailed(e.to_string()));
            }
        };

        let Some(remove_at) = sample.get(field.as_str()).and_then(parse_date) else {
            warn!(field = %field, "Sample document has no usable expiration field");
            return Findings::NoData(NoDataReason::MissingExpirationField {
                field: field.clone(),
            });
        };

        let expiration = ExpirationStatus::evaluate(remove_at, now, self.config.sweep_interval);
        let mut degraded = Vec::new();

        let document_count = match self.store.count_documents().await {
            Ok(count) => Some(count),
            Err(e) => {
                degraded.push(format!("document count unavailable: {}", e));
                None
            }
        };

        let ttl_indexes = match self.store.indexes().await {
            Ok(indexes) => indexes
                .iter()
                .filter_map(TtlIndexDescriptor::from_index)
                .collect(),
            Err(e) => {
                degraded.push(format!("index list unavailable: {}", e));
                Vec::new()
            }
        };

        let stats = match self.store.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                degraded.push(format!("collection stats unavailable: {}", e));
                None
            }
        };

        debug!(
            remove_at = %remove_at.to_rfc3339(),
            due = expiration.is_due(),
            count = ?document_count,
            ttl_indexes = ttl_indexes.len(),
            "Lifecycle inspected"
        );

        Findings::Inspected(Inspection {
            expiration,
            document_count,
            ttl_indexes,
            stats,
            degraded,
        })
    }

    /// Re-inspects every `every` until the collection drains or
    /// `max_rounds` inspections have run. Returns the number of rounds.
    pub async fn watch<F>(&self, every: Duration, max_rounds: Option<u32>, mut on_report: F) -> u32
    where
        F: FnMut(&LifecycleReport) + Send,
    {
        let mut rounds = 0u32;
        loop {
            let report = self.inspect().await;
            rounds += 1;
            on_report(&report);

            if report.is_drained() {
                info!(rounds = rounds, "Collection drained");
                break;
            }
            if max_rounds.is_some_and(|max| rounds >= max) {
                break;
            }
            tokio::time::sleep(every).await;
        }
        rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{
        card_history_collection, CollectionStats, IndexDescriptor, InsertManyOptions,
        InsertManyResult, MemoryCollection,
    };
    use async_trait::async_trait;
    use chrono::SecondsFormat;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed sample and counts every follow-up read.
    struct FixedStore {
        sample: Option<Value>,
        fail_stats: bool,
        follow_up_reads: AtomicUsize,
    }

    impl FixedStore {
        fn new(sample: Option<Value>) -> Self {
            Self {
                sample,
                fail_stats: false,
                follow_up_reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Store for FixedStore {
        async fn insert_many(
            &self,
            _documents: Vec<Value>,
            _options: InsertManyOptions,
        ) -> Result<InsertManyResult, StoreError> {
            Err(StoreError::Backend("read-only".into()))
        }

        async fn count_documents(&self) -> Result<u64, StoreError> {
            self.follow_up_reads.fetch_add(1, Ordering::SeqCst);
            Ok(u64::from(self.sample.is_some()))
        }

        async fn find_one(&self) -> Result<Option<Value>, StoreError> {
            Ok(self.sample.clone())
        }

        async fn find(&self, _limit: usize) -> Result<Vec<Value>, StoreError> {
            Ok(self.sample.clone().into_iter().collect())
        }

        async fn indexes(&self) -> Result<Vec<IndexDescriptor>, StoreError> {
            self.follow_up_reads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                IndexDescriptor::new("_id_", "_id", 1),
                IndexDescriptor::ttl("ttl_remove_at", "remove_at", 0),
            ])
        }

        async fn stats(&self) -> Result<CollectionStats, StoreError> {
            self.follow_up_reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_stats {
                return Err(StoreError::Backend("stats command failed".into()));
            }
            Ok(CollectionStats::default())
        }

        async fn delete_all(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    fn date(d: DateTime<Utc>) -> String {
        d.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn monitor(store: Arc<dyn Store>) -> LifecycleMonitor {
        LifecycleMonitor::new(store, MonitorConfig::default())
    }

    #[tokio::test]
    async fn test_empty_collection_stops_early() {
        let store = Arc::new(FixedStore::new(None));
        let report = monitor(store.clone()).inspect().await;

        assert_eq!(report.findings, Findings::NoData(NoDataReason::EmptyCollection));
        assert!(report.is_drained());
        assert_eq!(store.follow_up_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_expiration_field() {
        let store = Arc::new(FixedStore::new(Some(json!({"cardId": "card_1"}))));
        let report = monitor(store.clone()).inspect().await;

        assert_eq!(
            report.findings,
            Findings::NoData(NoDataReason::MissingExpirationField {
                field: "remove_at".into()
            })
        );
        assert!(!report.is_drained());
        assert_eq!(store.follow_up_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recently_expired_sample_is_due() {
        let now = Utc::now();
        let sample = json!({"remove_at": date(now - chrono::Duration::seconds(5))});
        let store = Arc::new(FixedStore::new(Some(sample)));

        let report = monitor(store).inspect_at(now).await;
        let inspection = report.inspection().unwrap();

        assert!(inspection.expiration.is_due());
        assert!(report.to_string().contains("Expiration already due"));
    }

    #[tokio::test]
    async fn test_pending_sample_reports_ttl_indexes_only() {
        let now = Utc::now();
        let remove_at = now + chrono::Duration::minutes(3);
        let store = Arc::new(FixedStore::new(Some(json!({"remove_at": date(remove_at)}))));

        let report = monitor(store).inspect_at(now).await;
        let inspection = report.inspection().unwrap();

        let ExpirationStatus::Pending {
            deletion_expected_around,
            ..
        } = inspection.expiration
        else {
            panic!("expected pending expiration");
        };
        assert_eq!(
            deletion_expected_around - inspection.expiration.remove_at(),
            chrono::Duration::seconds(60)
        );
        assert_eq!(inspection.document_count, Some(1));
        assert_eq!(inspection.ttl_indexes.len(), 1);
        assert_eq!(inspection.ttl_indexes[0].name, "ttl_remove_at");
        assert!(inspection.degraded.is_empty());
    }

    #[tokio::test]
    async fn test_failed_stats_degrade_report() {
        let now = Utc::now();
        let mut store = FixedStore::new(Some(json!({"remove_at": date(now)})));
        store.fail_stats = true;

        let report = monitor(Arc::new(store)).inspect_at(now).await;
        let inspection = report.inspection().unwrap();

        assert!(inspection.stats.is_none());
        assert_eq!(inspection.degraded.len(), 1);
        assert!(report.to_string().contains("warning: collection stats unavailable"));
    }

    #[tokio::test]
    async fn test_custom_sweep_interval_and_field() {
        let now = Utc::now();
        let collection = MemoryCollection::new("custom");
        collection
            .insert_documents(
                vec![json!({"expires": date(now + chrono::Duration::seconds(30))})],
                true,
            )
            .unwrap();

        let config = MonitorConfig {
            ttl_field: "expires".into(),
            sweep_interval: Duration::from_secs(10),
        };
        let report = LifecycleMonitor::new(Arc::new(collection), config)
            .inspect_at(now)
            .await;

        let inspection = report.inspection().unwrap();
        // No TTL index on this collection
        assert!(inspection.ttl_indexes.is_empty());
        match &inspection.expiration {
            ExpirationStatus::Pending {
                deletion_expected_around,
                remove_at,
                ..
            } => assert_eq!(*deletion_expected_around - *remove_at, chrono::Duration::seconds(10)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_watch_stops_when_drained() {
        let collection = Arc::new(card_history_collection().unwrap());
        let mut seen = 0;

        let rounds = monitor(collection)
            .watch(Duration::from_millis(1), Some(10), |_| seen += 1)
            .await;

        assert_eq!(rounds, 1);
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_watch_respects_round_limit() {
        let now = Utc::now();
        let store = Arc::new(FixedStore::new(Some(json!({"remove_at": date(now)}))));

        let rounds = monitor(store).watch(Duration::from_millis(1), Some(3), |_| {}).await;
        assert_eq!(rounds, 3);
    }
}
