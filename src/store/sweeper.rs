//! Background TTL Sweeper
//!
//! Removes expired documents from a [`MemoryCollection`] on a fixed cadence,
//! the way a document store's TTL monitor does. Between sweeps an expired
//! document is still counted and still readable; deletion is never
//! real-time.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 60s)
//! 2. Wakes up and removes every document whose deadline has passed
//! 3. Logs how many documents were removed
//!
//! Dropping the [`TtlSweeper`] handle stops the task.

use crate::config::DEFAULT_SWEEP_INTERVAL;
use crate::store::MemoryCollection;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the TTL sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps (default: 60s)
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// A handle to the running TTL sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct TtlSweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl TtlSweeper {
    /// Starts the sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(collection: Arc<MemoryCollection>, config: SweeperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            collection = collection.name(),
            interval_secs = config.interval.as_secs_f64(),
            "TTL sweeper started"
        );

        tokio::spawn(sweeper_loop(collection, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("TTL sweeper stopped");
        }
    }
}

impl Drop for TtlSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    collection: Arc<MemoryCollection>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("TTL sweeper received shutdown signal");
                    return;
                }
            }
        }

        let removed = collection.cleanup_expired(Utc::now());

        if removed > 0 {
            info!(
                collection = collection.name(),
                removed = removed,
                remaining = collection.len(),
                "TTL sweep removed expired documents"
            );
        } else {
            trace!(collection = collection.name(), "TTL sweep found nothing to remove");
        }
    }
}

/// Starts the sweeper with the default cadence.
pub fn start_ttl_sweeper(collection: Arc<MemoryCollection>) -> TtlSweeper {
    TtlSweeper::start(collection, SweeperConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexDescriptor;
    use chrono::SecondsFormat;
    use serde_json::json;

    fn collection_with_ttl() -> Arc<MemoryCollection> {
        let collection = Arc::new(MemoryCollection::new("sweep"));
        collection
            .create_index(IndexDescriptor::ttl("ttl_remove_at", "remove_at", 0))
            .unwrap();
        collection
    }

    fn in_millis(ms: i64) -> String {
        (Utc::now() + chrono::Duration::milliseconds(ms)).to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_documents() {
        let collection = collection_with_ttl();

        let mut docs: Vec<_> = (0..10).map(|_| json!({"remove_at": in_millis(30)})).collect();
        docs.push(json!({"remove_at": in_millis(3_600_000)}));
        docs.push(json!({"no_ttl_field": true}));
        collection.insert_documents(docs, false).unwrap();
        assert_eq!(collection.len(), 12);

        let config = SweeperConfig {
            interval: Duration::from_millis(10),
        };
        let _sweeper = TtlSweeper::start(Arc::clone(&collection), config);

        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.expired_count(), 10);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let collection = collection_with_ttl();

        {
            let _sweeper = TtlSweeper::start(
                Arc::clone(&collection),
                SweeperConfig {
                    interval: Duration::from_millis(10),
                },
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        collection
            .insert_documents(vec![json!({"remove_at": in_millis(5)})], false)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        // No sweeper and no lazy expiry: the document is still there
        assert_eq!(collection.len(), 1);
    }
}
