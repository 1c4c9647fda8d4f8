//! Event pump configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::PumpOptions;
use crate::domain::dispatch::UnmatchedPolicy;
use crate::domain::envelope::AdditionalMembers;

/// Pump configuration, shared by every job of the host
#[derive(Debug, Clone, Deserialize)]
pub struct PumpConfig {
    /// `error` rejects payload members the target type does not declare
    #[serde(default)]
    pub additional_members: AdditionalMembers,

    /// Messages processed in parallel per job
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Seconds between lease renewals of an in-flight message
    #[serde(default = "default_lease_renewal")]
    pub lease_renewal_secs: u64,

    /// Seconds in-flight handlers get to finish on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Milliseconds a receive call waits on an empty subscription
    #[serde(default = "default_receive_wait")]
    pub receive_wait_ms: u64,

    /// `dead_letter` or `complete` for envelopes no handler accepts
    #[serde(default)]
    pub unmatched: UnmatchedPolicy,
}

impl PumpConfig {
    pub fn lease_renewal_interval(&self) -> Duration {
        Duration::from_secs(self.lease_renewal_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn receive_wait(&self) -> Duration {
        Duration::from_millis(self.receive_wait_ms)
    }

    /// Builds validated pump options.
    pub fn options(&self) -> Result<PumpOptions, ValidationError> {
        let options = PumpOptions::default()
            .with_concurrency(self.concurrency)
            .with_lease_renewal_interval(self.lease_renewal_interval())
            .with_shutdown_grace(self.shutdown_grace())
            .with_receive_wait(self.receive_wait())
            .with_unmatched(self.unmatched);
        options.validate()?;
        Ok(options)
    }

    /// Validate pump configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.options().map(|_| ())
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            additional_members: AdditionalMembers::default(),
            concurrency: default_concurrency(),
            lease_renewal_secs: default_lease_renewal(),
            shutdown_grace_secs: default_shutdown_grace(),
            receive_wait_ms: default_receive_wait(),
            unmatched: UnmatchedPolicy::default(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_lease_renewal() -> u64 {
    30
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_receive_wait() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pump_config_defaults_match_options() {
        let options = PumpConfig::default().options().unwrap();
        assert_eq!(options, PumpOptions::default());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = PumpConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lease_renewal_is_rejected() {
        let config = PumpConfig {
            lease_renewal_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
