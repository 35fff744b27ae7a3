//! The bulk insertion run loop.

use super::{throughput, BatchPlan, BatchRange, InsertionSummary, ProgressReport};
use crate::config::LoadConfig;
use crate::error::{BatchSubmissionError, ConfigError, LoadError};
use crate::record::{Record, RecordGenerator};
use crate::store::{InsertManyOptions, Store};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// What one batch submission produced.
///
/// A store may write part of a batch and still raise an error, so the count
/// and the error are carried side by side.
#[derive(Debug)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub error: Option<BatchSubmissionError>,
}

/// A generated batch, alive only for the duration of its submission.
struct Batch {
    range: BatchRange,
    records: Vec<Record>,
}

impl Batch {
    fn generate(
        range: BatchRange,
        generator: &mut RecordGenerator,
        remove_at: DateTime<Utc>,
    ) -> Self {
        // Record indexes are 1-based
        let records = (range.start..range.end)
            .map(|i| generator.generate(i + 1, remove_at))
            .collect();
        Self { range, records }
    }

    fn into_documents(self) -> Result<Vec<Value>, LoadError> {
        self.records
            .iter()
            .map(|r| r.to_document().map_err(|e| LoadError::Encode(e.to_string())))
            .collect()
    }
}

/// Drives one insertion run against a [`Store`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ttlload::config::LoadConfig;
/// use ttlload::loader::BulkLoader;
/// use ttlload::store::card_history_collection;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(card_history_collection().unwrap());
/// let config = LoadConfig::new(2500, 1000).unwrap().with_seed(1);
///
/// let summary = BulkLoader::new(store.clone(), config).unwrap().run().await;
/// assert_eq!(summary.inserted, 2500);
/// assert_eq!(store.len(), 2500);
/// # });
/// ```
pub struct BulkLoader {
    store: Arc<dyn Store>,
    config: LoadConfig,
    ttl: chrono::Duration,
}

impl std::fmt::Debug for BulkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BulkLoader {
    pub fn new(store: Arc<dyn Store>, config: LoadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ttl = config.ttl_delta()?;
        Ok(Self { store, config, ttl })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Runs to completion, logging progress.
    pub async fn run(&self) -> InsertionSummary {
        self.run_with_progress(|_| {}).await
    }

    /// Runs to completion, handing every progress observation to `on_progress`.
    ///
    /// Never returns early with an error: a failed batch ends the loop and is
    /// recorded in [`InsertionSummary::failure`] alongside the totals reached.
    pub async fn run_with_progress<F>(&self, mut on_progress: F) -> InsertionSummary
    where
        F: FnMut(&ProgressReport) + Send,
    {
        let config = &self.config;
        let run_start = Utc::now();
        let remove_at = run_start + self.ttl;

        let mut generator = match config.seed {
            Some(seed) => RecordGenerator::seeded(seed, run_start, config.batch_size),
            None => RecordGenerator::from_entropy(run_start, config.batch_size),
        };

        let plan = BatchPlan::new(config.total_records, config.batch_size);
        let total_batches = plan.total_batches();

        info!(
            total_records = config.total_records,
            batch_size = config.batch_size,
            total_batches = total_batches,
            remove_at = %remove_at.to_rfc3339(),
            "Starting bulk insert"
        );

        let started = Instant::now();
        let mut attempted = 0u64;
        let mut inserted = 0u64;
        let mut batches_completed = 0u64;
        let mut failure = None;

        for range in plan.batches() {
            let batch = Batch::generate(range, &mut generator, remove_at);
            attempted += range.len();
            let outcome = self.submit(batch).await;
            inserted += outcome.inserted;

            if let Some(err) = outcome.error {
                error!(
                    batch = range.index,
                    partially_inserted = err.partially_inserted,
                    error = %err.source,
                    "Batch submission failed, aborting run"
                );
                failure = Some(err);
                break;
            }
            batches_completed += 1;

            if range.index % config.progress_every == 0 || range.index == total_batches {
                let elapsed = started.elapsed();
                let report = ProgressReport {
                    batch: range.index,
                    total_batches,
                    inserted,
                    target: config.total_records,
                    elapsed,
                    rate: throughput(inserted, elapsed),
                };
                debug!(
                    batch = report.batch,
                    inserted = report.inserted,
                    percent = %format!("{:.1}", report.percent()),
                    rate = report.rate,
                    "Bulk insert progress"
                );
                on_progress(&report);
            }
        }

        let summary = InsertionSummary {
            target: config.total_records,
            attempted,
            inserted,
            total_batches,
            batches_completed,
            elapsed: started.elapsed(),
            remove_at,
            failure,
        };

        info!(
            inserted = summary.inserted,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            rate = summary.average_rate(),
            complete = summary.is_complete(),
            "Bulk insert finished"
        );

        summary
    }

    /// Submits one batch as an unordered bulk write.
    async fn submit(&self, batch: Batch) -> BatchOutcome {
        let range = batch.range;
        let failed = |partially_inserted, source| BatchOutcome {
            inserted: partially_inserted,
            error: Some(BatchSubmissionError {
                batch: range.index,
                partially_inserted,
                source,
            }),
        };

        let documents = match batch.into_documents() {
            Ok(documents) => documents,
            Err(e) => return failed(0, e),
        };

        match self
            .store
            .insert_many(documents, InsertManyOptions::unordered())
            .await
        {
            Ok(result) => {
                debug!(
                    batch = range.index,
                    start = range.start,
                    end = range.end,
                    inserted = result.inserted_count(),
                    "Batch inserted"
                );
                BatchOutcome {
                    inserted: result.inserted_count(),
                    error: None,
                }
            }
            Err(e) => failed(e.inserted_count(), LoadError::Store(e)),
        }
    }
}
