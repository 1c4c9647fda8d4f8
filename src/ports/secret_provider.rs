//! SecretProvider port - resolves secret values by key.

use async_trait::async_trait;
use secrecy::Secret;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Port for reading secrets (connection strings, API tokens).
///
/// Values are wrapped in `Secret` so they never end up in logs by accident.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, key: &str) -> Result<Secret<String>, SecretError>;
}
