//! Options of the metrics collection job, validated on construction.

use std::time::Duration;

use crate::domain::foundation::{require_non_blank, ValidationError};

/// Default time between two collections.
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default cap on runs fetched per collection.
pub const DEFAULT_MAX_RUNS: u32 = 25;

/// Upper bound on runs fetched per collection.
pub const MAX_RUNS_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsJobOptions {
    base_url: String,
    token_secret_key: String,
    interval: Duration,
    max_runs: u32,
}

impl MetricsJobOptions {
    /// Both values must be non-blank; the base URL must be http(s).
    pub fn new(
        base_url: impl Into<String>,
        token_secret_key: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let base_url = base_url.into();
        let token_secret_key = token_secret_key.into();
        require_non_blank("base_url", &base_url)?;
        require_non_blank("token_secret_key", &token_secret_key)?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ValidationError::invalid_format(
                "base_url",
                "must start with http:// or https://",
            ));
        }
        Ok(Self {
            base_url,
            token_secret_key: token_secret_key.trim().to_string(),
            interval: DEFAULT_COLLECTION_INTERVAL,
            max_runs: DEFAULT_MAX_RUNS,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::invalid_format(
                "interval",
                "must be greater than zero",
            ));
        }
        self.interval = interval;
        Ok(self)
    }

    pub fn with_max_runs(mut self, max_runs: u32) -> Result<Self, ValidationError> {
        if max_runs == 0 || max_runs > MAX_RUNS_LIMIT {
            return Err(ValidationError::out_of_range(
                "max_runs",
                1,
                MAX_RUNS_LIMIT as u64,
                max_runs as u64,
            ));
        }
        self.max_runs = max_runs;
        Ok(self)
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_secret_key(&self) -> &str {
        &self.token_secret_key
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_runs(&self) -> u32 {
        self.max_runs
    }
}
