//! Metrics job configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::metrics::{MetricsJobOptions, DEFAULT_COLLECTION_INTERVAL, DEFAULT_MAX_RUNS};

/// Metrics job configuration; the job runs only when this section is set
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Base URL of the jobs API workspace
    pub base_url: String,

    /// Secret key of the API token
    pub token_secret_key: String,

    /// Seconds between collections
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum runs listed per collection
    #[serde(default = "default_max_runs")]
    pub max_runs: u32,
}

impl MetricsConfig {
    /// Builds validated job options.
    pub fn options(&self) -> Result<MetricsJobOptions, ValidationError> {
        Ok(MetricsJobOptions::new(self.base_url.as_str(), self.token_secret_key.as_str())?
            .with_interval(Duration::from_secs(self.interval_secs))?
            .with_max_runs(self.max_runs)?)
    }

    /// Validate metrics configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.options().map(|_| ())
    }
}

fn default_interval() -> u64 {
    DEFAULT_COLLECTION_INTERVAL.as_secs()
}

fn default_max_runs() -> u32 {
    DEFAULT_MAX_RUNS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MetricsConfig {
        MetricsConfig {
            base_url: "https://adb-1.azuredatabricks.net/".to_string(),
            token_secret_key: "databricks-token".to_string(),
            interval_secs: default_interval(),
            max_runs: default_max_runs(),
        }
    }

    #[test]
    fn test_options_from_config() {
        let options = config().options().unwrap();
        assert_eq!(options.base_url(), "https://adb-1.azuredatabricks.net");
        assert_eq!(options.max_runs(), 25);
    }

    #[test]
    fn test_blank_token_key_is_rejected() {
        let config = MetricsConfig {
            token_secret_key: "  ".to_string(),
            ..config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = MetricsConfig {
            interval_secs: 0,
            ..config()
        };
        assert!(config.validate().is_err());
    }
}
