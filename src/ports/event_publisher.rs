//! EventPublisher port - Interface for publishing envelopes downstream.
//!
//! Jobs forward decoded envelopes and collected run records through this
//! port without knowing the transport (event grid, Redis stream, log).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::envelope::Envelope;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to publish envelope '{envelope_id}': {reason}")]
pub struct PublishError {
    pub envelope_id: String,
    pub reason: String,
}

impl PublishError {
    pub fn new(envelope_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            reason: reason.into(),
        }
    }
}

/// Port for publishing envelopes.
///
/// Implementations must ensure:
/// - Envelopes are delivered at-least-once (receivers may see duplicates)
/// - Errors are propagated to the caller
///
/// # Example
///
/// ```ignore
/// let envelope = Envelope::new(EventId::new(), "job.run.finished", "/metrics")
///     .with_json_data(serde_json::to_value(&record)?);
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single envelope.
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError>;

    /// Publish several envelopes in order.
    ///
    /// Stops at the first failure; envelopes before it stay published.
    async fn publish_all(&self, envelopes: Vec<Envelope>) -> Result<(), PublishError> {
        for envelope in envelopes {
            self.publish(envelope).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventPublisher) {}

    // Compile-time check that trait is Send + Sync
    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn event_publisher_is_send_sync() {
        #[allow(dead_code)]
        fn check<T: EventPublisher>() {
            assert_send_sync::<T>();
        }
    }
}
