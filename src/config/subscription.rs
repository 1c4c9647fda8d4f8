//! Subscription configuration of the secret invalidation job

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::subscription::{SubscriptionDescriptor, SubscriptionMode};

/// Subscription configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// `automatic`, `none` or `given_name`
    #[serde(default = "default_mode")]
    pub mode: SubscriptionMode,

    /// Prefix of generated names (mode `automatic`)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Existing subscription to consume (mode `given_name`)
    pub name: Option<String>,
}

impl SubscriptionConfig {
    /// Builds the descriptor; the automatic name is generated here, once.
    pub fn descriptor(&self, topic: &str) -> Result<SubscriptionDescriptor, ValidationError> {
        match self.mode {
            SubscriptionMode::Automatic => Ok(SubscriptionDescriptor::automatic(topic, &self.prefix)?),
            SubscriptionMode::None => Ok(SubscriptionDescriptor::none(topic)),
            SubscriptionMode::GivenName => {
                let name = self
                    .name
                    .as_deref()
                    .ok_or(ValidationError::MissingRequired("SUBSCRIPTION__NAME"))?;
                Ok(SubscriptionDescriptor::given(topic, name)?)
            }
        }
    }

    /// Validate subscription configuration
    pub fn validate(&self, topic: &str) -> Result<(), ValidationError> {
        self.descriptor(topic).map(|_| ())
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            prefix: default_prefix(),
            name: None,
        }
    }
}

fn default_mode() -> SubscriptionMode {
    SubscriptionMode::Automatic
}

fn default_prefix() -> String {
    "background-jobs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automatic_descriptor_uses_prefix() {
        let descriptor = SubscriptionConfig::default().descriptor("secrets").unwrap();
        assert_eq!(descriptor.mode(), SubscriptionMode::Automatic);
        assert!(descriptor.name().unwrap().starts_with("background-jobs-"));
    }

    #[test]
    fn test_given_name_requires_name() {
        let config = SubscriptionConfig {
            mode: SubscriptionMode::GivenName,
            ..Default::default()
        };
        assert!(matches!(config.validate("secrets"), Err(ValidationError::MissingRequired(_))));
    }

    #[test]
    fn test_given_name_too_long_is_rejected() {
        let config = SubscriptionConfig {
            mode: SubscriptionMode::GivenName,
            name: Some("x".repeat(51)),
            ..Default::default()
        };
        assert!(matches!(config.validate("secrets"), Err(ValidationError::Invalid(_))));
    }

    #[test]
    fn test_none_has_no_name() {
        let config = SubscriptionConfig {
            mode: SubscriptionMode::None,
            ..Default::default()
        };
        assert!(config.descriptor("secrets").unwrap().name().is_none());
    }
}
