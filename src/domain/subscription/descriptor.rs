//! SubscriptionDescriptor - which subscription a job consumes, and how it
//! comes to exist.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{require_non_blank, short_unique_suffix, ValidationError};

/// Maximum length of a subscription name accepted by the bus.
pub const MAX_SUBSCRIPTION_NAME_LEN: usize = 50;

/// How the job obtains its subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// A uniquely named subscription is created on startup if absent.
    Automatic,
    /// No subscription is created or consumed.
    None,
    /// The named subscription must already exist.
    GivenName,
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionMode::Automatic => "automatic",
            SubscriptionMode::None => "none",
            SubscriptionMode::GivenName => "given_name",
        };
        write!(f, "{}", s)
    }
}

/// Immutable description of a job's subscription, fixed at startup.
///
/// For `Automatic` the unique name is generated once here, so repeated
/// provisioning of the same descriptor targets the same subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    topic: String,
    name: Option<String>,
    mode: SubscriptionMode,
}

impl SubscriptionDescriptor {
    /// Descriptor for a generated `prefix-suffix` subscription.
    pub fn automatic(topic: impl Into<String>, prefix: &str) -> Result<Self, ValidationError> {
        let topic = topic.into();
        require_non_blank("topic", &topic)?;
        require_non_blank("subscription_prefix", prefix)?;
        Ok(Self {
            topic,
            name: Some(generate_name(prefix.trim())),
            mode: SubscriptionMode::Automatic,
        })
    }

    /// Descriptor for an existing, explicitly named subscription.
    pub fn given(topic: impl Into<String>, name: impl Into<String>) -> Result<Self, ValidationError> {
        let topic = topic.into();
        let name = name.into();
        require_non_blank("topic", &topic)?;
        require_non_blank("subscription_name", &name)?;
        if name.len() > MAX_SUBSCRIPTION_NAME_LEN {
            return Err(ValidationError::out_of_range(
                "subscription_name",
                1,
                MAX_SUBSCRIPTION_NAME_LEN as u64,
                name.len() as u64,
            ));
        }
        Ok(Self {
            topic,
            name: Some(name),
            mode: SubscriptionMode::GivenName,
        })
    }

    /// Descriptor for a job that consumes nothing.
    pub fn none(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            name: None,
            mode: SubscriptionMode::None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The subscription name; `None` only for `SubscriptionMode::None`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Topic and name together; `None` when nothing is consumed.
    pub fn path(&self) -> Option<SubscriptionPath> {
        self.name
            .as_ref()
            .map(|name| SubscriptionPath::new(self.topic.clone(), name.clone()))
    }
}

/// Fully qualified subscription: `topic/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionPath {
    pub topic: String,
    pub name: String,
}

impl SubscriptionPath {
    pub fn new(topic: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SubscriptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.name)
    }
}

/// Builds `prefix-suffix`, truncating the prefix so the result fits the bus limit.
fn generate_name(prefix: &str) -> String {
    let suffix = short_unique_suffix();
    let room = MAX_SUBSCRIPTION_NAME_LEN - suffix.len() - 1;
    let mut end = prefix.len().min(room);
    while !prefix.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}-{}", &prefix[..end], suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn automatic_name_starts_with_prefix() {
        let descriptor = SubscriptionDescriptor::automatic("orders", "Test").unwrap();
        let name = descriptor.name().unwrap();
        assert!(name.starts_with("Test-"));
        assert_eq!(name.len(), "Test-".len() + 8);
        assert_eq!(descriptor.mode(), SubscriptionMode::Automatic);
    }

    #[test]
    fn automatic_names_are_unique_per_descriptor() {
        let a = SubscriptionDescriptor::automatic("orders", "Test").unwrap();
        let b = SubscriptionDescriptor::automatic("orders", "Test").unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn automatic_name_is_stable_for_one_descriptor() {
        let a = SubscriptionDescriptor::automatic("orders", "Test").unwrap();
        let copy = a.clone();
        assert_eq!(a.name(), copy.name());
    }

    #[test]
    fn long_prefix_is_truncated_to_bus_limit() {
        let prefix = "p".repeat(80);
        let descriptor = SubscriptionDescriptor::automatic("orders", &prefix).unwrap();
        let name = descriptor.name().unwrap();
        assert_eq!(name.len(), MAX_SUBSCRIPTION_NAME_LEN);
        assert!(name.starts_with("ppp"));
    }

    #[test]
    fn blank_prefix_is_rejected() {
        assert!(matches!(
            SubscriptionDescriptor::automatic("orders", "  "),
            Err(ValidationError::EmptyField { field }) if field == "subscription_prefix"
        ));
    }

    #[test]
    fn blank_topic_is_rejected() {
        assert!(SubscriptionDescriptor::automatic("", "Test").is_err());
        assert!(SubscriptionDescriptor::given("", "existing").is_err());
    }

    #[test]
    fn given_name_is_kept_verbatim() {
        let descriptor = SubscriptionDescriptor::given("orders", "audit").unwrap();
        assert_eq!(descriptor.name(), Some("audit"));
        assert_eq!(descriptor.mode(), SubscriptionMode::GivenName);
    }

    #[test]
    fn given_name_over_limit_is_rejected() {
        let result = SubscriptionDescriptor::given("orders", "n".repeat(51));
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn none_descriptor_has_no_name() {
        let descriptor = SubscriptionDescriptor::none("orders");
        assert_eq!(descriptor.name(), None);
        assert_eq!(descriptor.mode(), SubscriptionMode::None);
        assert_eq!(descriptor.path(), None);
    }

    #[test]
    fn path_displays_topic_and_name() {
        let descriptor = SubscriptionDescriptor::given("orders", "audit").unwrap();
        assert_eq!(descriptor.path().unwrap().to_string(), "orders/audit");
    }

    proptest! {
        #[test]
        fn automatic_name_always_fits_bus_limit(prefix in "\\PC{1,80}") {
            prop_assume!(!prefix.trim().is_empty());
            let descriptor = SubscriptionDescriptor::automatic("orders", &prefix).unwrap();
            let name = descriptor.name().unwrap();
            prop_assert!(name.len() <= MAX_SUBSCRIPTION_NAME_LEN);
            prop_assert!(name.starts_with(prefix.trim().chars().next().unwrap()));
        }
    }
}
