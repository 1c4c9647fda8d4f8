//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Bus connection must be configured either directly or via a secret key, not both")]
    AmbiguousBusCredentials,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Lease renewal every {renewal_secs}s must be at most half the bus claim idle of {claim_idle_secs}s")]
    LeaseRenewalTooSlow { renewal_secs: u64, claim_idle_secs: u64 },

    #[error(transparent)]
    Invalid(#[from] crate::domain::foundation::ValidationError),
}
