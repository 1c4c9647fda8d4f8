//! Cloud-event forwarding job configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::subscription::SubscriptionDescriptor;

/// Forwarding job configuration; the job runs only when this section is set
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardingConfig {
    /// Topic whose envelopes are forwarded
    pub topic: String,

    /// Stream envelopes are republished to
    pub destination: String,

    /// Prefix of the generated subscription name
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Republish in binary content mode
    #[serde(default)]
    pub binary: bool,
}

impl ForwardingConfig {
    pub fn descriptor(&self) -> Result<SubscriptionDescriptor, ValidationError> {
        Ok(SubscriptionDescriptor::automatic(self.topic.as_str(), &self.prefix)?)
    }

    /// Validate forwarding configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.destination.trim().is_empty() {
            return Err(ValidationError::MissingRequired("FORWARDING__DESTINATION"));
        }
        if self.destination.trim() == self.topic.trim() {
            return Err(ValidationError::Invalid(
                crate::domain::foundation::ValidationError::invalid_format(
                    "forwarding.destination",
                    "must differ from the forwarded topic",
                ),
            ));
        }
        self.descriptor().map(|_| ())
    }
}

fn default_prefix() -> String {
    "forwarding".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(topic: &str, destination: &str) -> ForwardingConfig {
        ForwardingConfig {
            topic: topic.to_string(),
            destination: destination.to_string(),
            prefix: default_prefix(),
            binary: false,
        }
    }

    #[test]
    fn test_valid_forwarding() {
        assert!(config("orders", "orders-grid").validate().is_ok());
    }

    #[test]
    fn test_forwarding_loop_is_rejected() {
        assert!(config("orders", "orders").validate().is_err());
    }

    #[test]
    fn test_missing_destination_is_rejected() {
        assert!(matches!(
            config("orders", " ").validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }
}
