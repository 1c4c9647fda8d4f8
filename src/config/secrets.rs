//! Secret provider configuration

use serde::Deserialize;

use crate::adapters::secrets::DEFAULT_SECRET_ENV_PREFIX;

/// Secret provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Prefix of the environment variables secrets are read from
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

fn default_env_prefix() -> String {
    DEFAULT_SECRET_ENV_PREFIX.to_string()
}
