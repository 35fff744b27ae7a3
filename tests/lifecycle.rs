//! Load, sweep and monitor against the in-memory collection.

use std::sync::Arc;
use std::time::Duration;
use ttlload::config::{LoadConfig, MonitorConfig};
use ttlload::loader::BulkLoader;
use ttlload::monitor::{ExpirationStatus, Findings, LifecycleMonitor, NoDataReason};
use ttlload::store::{card_history_collection, Store, SweeperConfig, TtlSweeper};

#[tokio::test]
async fn loaded_records_expire_through_the_sweeper() {
    let collection = Arc::new(card_history_collection().unwrap());
    let store: Arc<dyn Store> = collection.clone();

    let sweep_interval = Duration::from_millis(50);
    let _sweeper = TtlSweeper::start(
        Arc::clone(&collection),
        SweeperConfig {
            interval: sweep_interval,
        },
    );

    let config = LoadConfig::new(3000, 1000)
        .unwrap()
        .with_ttl_offset(Duration::from_secs(2))
        .with_seed(17);
    let summary = BulkLoader::new(Arc::clone(&store), config)
        .unwrap()
        .run()
        .await;

    assert!(summary.is_complete());
    assert_eq!(summary.inserted, 3000);
    assert_eq!(store.count_documents().await.unwrap(), 3000);

    let monitor = LifecycleMonitor::new(
        Arc::clone(&store),
        MonitorConfig {
            sweep_interval,
            ..Default::default()
        },
    );

    let before = monitor.inspect().await;
    let inspection = before.inspection().expect("collection has data");
    assert!(matches!(
        inspection.expiration,
        ExpirationStatus::Pending { .. }
    ));
    assert_eq!(inspection.expiration.remove_at(), summary.remove_at);
    assert_eq!(inspection.document_count, Some(3000));
    assert_eq!(inspection.ttl_indexes.len(), 1);
    assert_eq!(inspection.ttl_indexes[0].expire_after_seconds, 0);

    let stats = inspection.stats.expect("stats");
    assert_eq!(stats.count, 3000);
    assert_eq!(stats.nindexes, 2);
    assert!(stats.avg_obj_size > 500);

    let mut reports = Vec::new();
    monitor
        .watch(Duration::from_millis(100), Some(100), |r| reports.push(r.clone()))
        .await;

    let last = reports.last().expect("at least one report");
    assert!(last.is_drained());
    assert!(collection.is_empty());
    assert_eq!(collection.expired_count(), 3000);

    // Earlier rounds saw the documents still present but already due or pending
    assert!(reports.iter().any(|r| matches!(r.findings, Findings::Inspected(_))));
}

#[tokio::test]
async fn monitor_on_fresh_collection_reports_no_data() {
    let store: Arc<dyn Store> = Arc::new(card_history_collection().unwrap());

    let report = LifecycleMonitor::new(store, MonitorConfig::default())
        .inspect()
        .await;

    assert_eq!(report.findings, Findings::NoData(NoDataReason::EmptyCollection));
    assert!(report.to_string().contains("No documents found"));
}
