//! Batch Insertion
//!
//! Splits a target record count into fixed-size batches, generates and
//! submits them one after another, and accumulates an [`InsertionSummary`].
//!
//! ## Run Loop
//!
//! ```text
//!  remove_at = now + ttl_offset          (once per run)
//!        │
//!        ▼
//!  for batch in 1..=ceil(T / B)
//!    ┌──────────────────────────────┐
//!    │ generate records [start,end) │
//!    └──────────────┬───────────────┘
//!                   ▼
//!    ┌──────────────────────────────┐   error   ┌─────────────────────┐
//!    │ insert_many(ordered: false)  │──────────>│ keep partial count, │
//!    └──────────────┬───────────────┘           │ stop the run        │
//!                   │ ok                        └─────────────────────┘
//!                   ▼
//!    ┌──────────────────────────────┐
//!    │ progress every N / last batch│
//!    └──────────────────────────────┘
//! ```
//!
//! A failed batch is never retried and no later batch is attempted.

pub mod engine;
pub mod smoke;

pub use engine::{BatchOutcome, BulkLoader};
pub use smoke::{smoke_load, SmokeReport, SMOKE_RECORDS};

use crate::error::BatchSubmissionError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Half-open `[start, end)` slice of the global record index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    /// 1-based batch number
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl BatchRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Partition of `total_records` into batches of at most `batch_size`.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan {
    total_records: u64,
    batch_size: u64,
}

impl BatchPlan {
    pub fn new(total_records: u64, batch_size: u64) -> Self {
        Self {
            total_records,
            batch_size: batch_size.max(1),
        }
    }

    pub fn total_batches(&self) -> u64 {
        self.total_records.div_ceil(self.batch_size)
    }

    /// Batch ranges in submission order.
    pub fn batches(&self) -> impl Iterator<Item = BatchRange> {
        let Self {
            total_records,
            batch_size,
        } = *self;

        (1..=self.total_batches()).map(move |index| {
            let start = (index - 1) * batch_size;
            BatchRange {
                index,
                start,
                end: (start + batch_size).min(total_records),
            }
        })
    }
}

/// Whole documents per second, 0 when no measurable time has passed.
pub fn throughput(count: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (count as f64 / secs).floor() as u64
    } else {
        0
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// A progress observation emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub batch: u64,
    pub total_batches: u64,
    /// Cumulative documents inserted
    pub inserted: u64,
    pub target: u64,
    pub elapsed: Duration,
    /// Documents per second so far
    pub rate: u64,
}

impl ProgressReport {
    pub fn percent(&self) -> f64 {
        percent(self.inserted, self.target)
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch {}/{} completed. Progress: {:.1}% ({}/{}) - Rate: {} docs/sec",
            self.batch,
            self.total_batches,
            self.percent(),
            self.inserted,
            self.target,
            self.rate
        )
    }
}

/// Totals of a finished (or aborted) insertion run.
#[derive(Debug, Clone)]
pub struct InsertionSummary {
    /// Records the run set out to insert
    pub target: u64,
    /// Records handed to the store, failed batch included
    pub attempted: u64,
    /// Records the store reports as inserted, partial batch included
    pub inserted: u64,
    pub total_batches: u64,
    /// Batches submitted without error
    pub batches_completed: u64,
    pub elapsed: Duration,
    /// Expiration timestamp shared by every record of the run
    pub remove_at: DateTime<Utc>,
    /// The batch failure that ended the run early
    pub failure: Option<BatchSubmissionError>,
}

impl InsertionSummary {
    pub fn average_rate(&self) -> u64 {
        throughput(self.inserted, self.elapsed)
    }

    /// Batches the run actually sent to the store.
    pub fn batches_attempted(&self) -> u64 {
        self.batches_completed + u64::from(self.failure.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.batches_completed == self.total_batches
    }
}

impl fmt::Display for InsertionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => writeln!(f, "Bulk insert completed!")?,
            Some(err) => writeln!(f, "Bulk insert aborted: {}", err)?,
        }
        writeln!(
            f,
            "Total documents inserted: {} of {} ({:.1}%)",
            self.inserted,
            self.target,
            percent(self.inserted, self.target)
        )?;
        writeln!(f, "Total documents attempted: {}", self.attempted)?;
        writeln!(
            f,
            "Batches submitted: {}/{}",
            self.batches_attempted(),
            self.total_batches
        )?;
        writeln!(f, "Total time: {:.2} seconds", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "Average insertion rate: {} documents/second",
            self.average_rate()
        )?;
        write!(f, "All documents will expire at: {}", self.remove_at.to_rfc3339())
    }
}
