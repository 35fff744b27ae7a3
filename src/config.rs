//! Run configuration for the loader and the monitor.

use crate::error::ConfigError;
use std::time::Duration;

/// Default number of records one run inserts.
pub const DEFAULT_TOTAL_RECORDS: u64 = 2_500_000;

/// Default number of records per `insert_many` call.
pub const DEFAULT_BATCH_SIZE: u64 = 1000;

/// Default distance between run start and the shared `remove_at`.
pub const DEFAULT_TTL_OFFSET: Duration = Duration::from_secs(5 * 60);

/// Progress is reported every this many batches (and on the last one).
pub const DEFAULT_PROGRESS_EVERY: u64 = 500;

/// Approximate cadence of the store's background TTL sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Field the TTL index keys on.
pub const DEFAULT_TTL_FIELD: &str = "remove_at";

/// Configuration for one insertion run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// How many records to generate and submit
    pub total_records: u64,

    /// Records per batch
    pub batch_size: u64,

    /// Added to run start to produce the shared `remove_at`
    pub ttl_offset: Duration,

    /// Batch cadence for progress reports
    pub progress_every: u64,

    /// Seed for record values; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            total_records: DEFAULT_TOTAL_RECORDS,
            batch_size: DEFAULT_BATCH_SIZE,
            ttl_offset: DEFAULT_TTL_OFFSET,
            progress_every: DEFAULT_PROGRESS_EVERY,
            seed: None,
        }
    }
}

impl LoadConfig {
    /// Creates a validated configuration with default TTL offset and cadence.
    pub fn new(total_records: u64, batch_size: u64) -> Result<Self, ConfigError> {
        let config = Self {
            total_records,
            batch_size,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_ttl_offset(mut self, ttl_offset: Duration) -> Self {
        self.ttl_offset = ttl_offset;
        self
    }

    pub fn with_progress_every(mut self, progress_every: u64) -> Self {
        self.progress_every = progress_every;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_records == 0 {
            return Err(ConfigError::ZeroTotalRecords);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.progress_every == 0 {
            return Err(ConfigError::ZeroProgressCadence);
        }
        self.ttl_delta()?;
        Ok(())
    }

    /// The TTL offset as a calendar duration.
    pub fn ttl_delta(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::from_std(self.ttl_offset).map_err(|_| ConfigError::TtlOffsetOutOfRange)
    }
}

/// Configuration for the lifecycle monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Date field read from the sample document
    pub ttl_field: String,

    /// Store-defined sweep cadence used for the deletion estimate
    pub sweep_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ttl_field: DEFAULT_TTL_FIELD.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoadConfig::default();
        assert_eq!(config.total_records, 2_500_000);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.ttl_offset, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_counts() {
        assert_eq!(
            LoadConfig::new(0, 10).unwrap_err(),
            ConfigError::ZeroTotalRecords
        );
        assert_eq!(
            LoadConfig::new(10, 0).unwrap_err(),
            ConfigError::ZeroBatchSize
        );

        let config = LoadConfig::new(10, 5).unwrap().with_progress_every(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroProgressCadence));
    }

    #[test]
    fn test_rejects_unrepresentable_ttl_offset() {
        let config = LoadConfig::default().with_ttl_offset(Duration::MAX);
        assert_eq!(config.validate(), Err(ConfigError::TtlOffsetOutOfRange));
        assert_eq!(
            LoadConfig::default().ttl_delta().unwrap(),
            chrono::Duration::minutes(5)
        );
    }
}
