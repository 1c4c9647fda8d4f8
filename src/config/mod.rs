//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `BACKGROUND_JOBS` prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use background_jobs::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Health endpoint on {}", config.server.socket_addr().unwrap());
//! ```

mod bus;
mod error;
mod forwarding;
mod metrics;
mod pump;
mod secrets;
mod server;
mod subscription;

pub use bus::{validate_redis_url, BusConfig, BusCredentials};
pub use error::{ConfigError, ValidationError};
pub use forwarding::ForwardingConfig;
pub use metrics::MetricsConfig;
pub use pump::PumpConfig;
pub use secrets::SecretsConfig;
pub use server::ServerConfig;
pub use subscription::SubscriptionConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Health endpoint and log filter
    #[serde(default)]
    pub server: ServerConfig,

    /// Message bus connection and topic
    pub bus: BusConfig,

    /// Subscription of the secret invalidation job
    #[serde(default)]
    pub subscription: SubscriptionConfig,

    /// Pump tuning shared by all jobs
    #[serde(default)]
    pub pump: PumpConfig,

    /// Secret provider
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Cloud-event forwarding job (optional)
    pub forwarding: Option<ForwardingConfig>,

    /// Metrics collection job (optional)
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `BACKGROUND_JOBS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `BACKGROUND_JOBS__PUMP__CONCURRENCY=4` -> `pump.concurrency = 4`
    /// - `BACKGROUND_JOBS__BUS__URL=...` -> `bus.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BACKGROUND_JOBS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.bus.validate()?;
        self.subscription.validate(&self.bus.topic)?;
        self.pump.validate()?;
        self.validate_lease_renewal()?;
        if let Some(forwarding) = &self.forwarding {
            forwarding.validate()?;
        }
        if let Some(metrics) = &self.metrics {
            metrics.validate()?;
        }
        Ok(())
    }

    /// Leases must be renewed well before the bus hands an idle message to
    /// another worker.
    fn validate_lease_renewal(&self) -> Result<(), ValidationError> {
        let renewal_secs = self.pump.lease_renewal_secs;
        let claim_idle_secs = self.bus.claim_idle_secs;
        if renewal_secs.saturating_mul(2) > claim_idle_secs {
            return Err(ValidationError::LeaseRenewalTooSlow {
                renewal_secs,
                claim_idle_secs,
            });
        }
        Ok(())
    }
}
