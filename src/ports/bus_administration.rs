//! BusAdministration port - management plane of the message bus.
//!
//! Used at job startup to check, create and (in tests) remove subscriptions.
//! Message traffic goes through `BusReceiver`.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by bus adapters, on both the management and data plane.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("subscription '{subscription}' already exists on topic '{topic}'")]
    AlreadyExists { topic: String, subscription: String },

    #[error("subscription '{subscription}' does not exist on topic '{topic}'")]
    NotFound { topic: String, subscription: String },

    #[error("message '{message_id}' is no longer held by this consumer")]
    LeaseLost { message_id: String },

    #[error("bus unavailable: {0}")]
    Unavailable(String),

    #[error("bus operation failed: {0}")]
    Operation(String),
}

/// Port for managing subscriptions on a topic.
///
/// Implementations must report a create race as `BusError::AlreadyExists`
/// so callers can treat it as success.
#[async_trait]
pub trait BusAdministration: Send + Sync {
    /// Returns true if `subscription` exists on `topic`.
    async fn subscription_exists(&self, topic: &str, subscription: &str) -> Result<bool, BusError>;

    /// Creates `subscription` on `topic`.
    async fn create_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError>;

    /// Deletes `subscription`. Only cleanup code and tests call this.
    async fn delete_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError>;

    /// Names of all subscriptions on `topic`.
    async fn list_subscriptions(&self, topic: &str) -> Result<Vec<String>, BusError>;
}
