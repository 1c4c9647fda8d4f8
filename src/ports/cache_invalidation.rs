//! CacheInvalidationSink port - drops cached secret values.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to invalidate cached secret '{secret_name}': {reason}")]
pub struct InvalidationError {
    pub secret_name: String,
    pub reason: String,
}

impl InvalidationError {
    pub fn new(secret_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            reason: reason.into(),
        }
    }
}

/// Port for invalidating a cached secret.
///
/// Invalidating a name that is not cached (or was already invalidated) must
/// succeed without effect.
#[async_trait]
pub trait CacheInvalidationSink: Send + Sync {
    async fn invalidate(&self, secret_name: &str) -> Result<(), InvalidationError>;
}
