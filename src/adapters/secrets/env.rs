//! Secret provider reading process environment variables.
//!
//! A key such as `bus-connection` is looked up as `{prefix}BUS_CONNECTION`.

use async_trait::async_trait;
use secrecy::Secret;

use crate::ports::{SecretError, SecretProvider};

/// Default variable prefix.
pub const DEFAULT_SECRET_ENV_PREFIX: &str = "BACKGROUND_JOBS_SECRET_";

#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Environment variable name holding `key`.
    pub fn variable_name(&self, key: &str) -> String {
        let normalized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, normalized)
    }
}

impl Default for EnvSecretProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ENV_PREFIX)
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, key: &str) -> Result<Secret<String>, SecretError> {
        match std::env::var(self.variable_name(key)) {
            Ok(value) if !value.trim().is_empty() => Ok(Secret::new(value)),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::NotFound(key.to_string())),
            Err(e) => Err(SecretError::Unavailable(e.to_string())),
        }
    }
}
