//! Error types shared across the loader, the monitor and the store boundary.

use std::fmt;

/// Server error code reported for a document rejected by the schema validator.
pub const DOCUMENT_VALIDATION_FAILURE: i32 = 121;

/// A single per-document failure inside a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    /// Position of the failed document within the submitted batch
    pub index: usize,
    /// Store-defined error code
    pub code: i32,
    /// Human-readable failure description
    pub message: String,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (code {}): {}", self.index, self.code, self.message)
    }
}

/// Aggregate failure of an `insert_many` call.
///
/// The store may have written part of the batch before reporting the failure,
/// so the inserted count travels with the per-document errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkWriteFailure {
    /// Documents actually written before/around the failures
    pub inserted_count: u64,
    /// One entry per rejected document
    pub write_errors: Vec<WriteError>,
}

impl fmt::Display for BulkWriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} write error(s), {} document(s) inserted",
            self.write_errors.len(),
            self.inserted_count
        )?;
        if let Some(first) = self.write_errors.first() {
            write!(f, "; first: {}", first)?;
        }
        Ok(())
    }
}

/// Errors raised by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Bulk write finished with per-document failures
    #[error("bulk write error: {0}")]
    BulkWrite(BulkWriteFailure),

    /// Unknown index or collection option
    #[error("invalid index specification: {0}")]
    InvalidIndex(String),

    /// Anything else the backend reports (connection, lock, encoding)
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Number of documents the store reports as written despite the error.
    pub fn inserted_count(&self) -> u64 {
        match self {
            StoreError::BulkWrite(failure) => failure.inserted_count,
            _ => 0,
        }
    }
}

/// Invalid loader or monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("total records must be greater than zero")]
    ZeroTotalRecords,

    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("progress cadence must be at least one batch")]
    ZeroProgressCadence,

    #[error("ttl offset is too large to represent as a timestamp offset")]
    TtlOffsetOutOfRange,
}

/// Why a single batch could not be submitted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// The store raised an error for the batch write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A generated record could not be turned into a document
    #[error("failed to encode record: {0}")]
    Encode(String),
}

/// Terminal failure of an insertion run: the batch that failed and why.
#[derive(Debug, Clone, thiserror::Error)]
#[error("batch {batch} failed: {source}")]
pub struct BatchSubmissionError {
    /// 1-based number of the failed batch
    pub batch: u64,
    /// Documents of this batch the store still reports as written
    pub partially_inserted: u64,
    #[source]
    pub source: LoadError,
}
