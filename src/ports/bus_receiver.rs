//! BusReceiver port - data plane of the message bus.
//!
//! Messages are received under a lease (peek-lock). Each received message
//! must be settled exactly once with `complete`, `abandon` or `dead_letter`;
//! until then `renew_lease` keeps other consumers from taking it over.

use async_trait::async_trait;
use std::time::Duration;

use super::BusError;
use crate::domain::envelope::RawMessage;
use crate::domain::subscription::SubscriptionPath;

/// Port for pulling and settling messages on a subscription.
#[async_trait]
pub trait BusReceiver: Send + Sync {
    /// Receives up to `max_batch` messages.
    ///
    /// Suspends up to `wait` while the subscription is empty and returns an
    /// empty batch when nothing arrived.
    async fn receive(
        &self,
        subscription: &SubscriptionPath,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<RawMessage>, BusError>;

    /// Removes the message from the subscription.
    async fn complete(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError>;

    /// Releases the lease so the bus redelivers the message.
    async fn abandon(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError>;

    /// Moves the message to the dead-letter queue with `reason`.
    async fn dead_letter(
        &self,
        subscription: &SubscriptionPath,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), BusError>;

    /// Extends the lease on a message still being processed.
    async fn renew_lease(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError>;
}
