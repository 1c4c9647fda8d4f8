//! MessageHandler port - business logic invoked for a typed payload.

use async_trait::async_trait;

use crate::domain::dispatch::JobRunContext;
use crate::domain::envelope::{Envelope, Payload};
use crate::domain::foundation::HandlerError;

/// Handler for one payload type.
///
/// Implementations should be:
/// - **Idempotent** - the bus delivers at-least-once
/// - **Honest about faults** - `HandlerError::Transient` when a retry could
///   succeed, `HandlerError::Permanent` when it never will
///
/// # Example
///
/// ```ignore
/// struct OrderProjector { /* ... */ }
///
/// #[async_trait]
/// impl MessageHandler<OrderCreated> for OrderProjector {
///     async fn handle(&self, order: OrderCreated, ctx: &JobRunContext) -> Result<(), HandlerError> {
///         self.store.save(order).await.map_err(|e| HandlerError::transient(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "OrderProjector"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler<T: Payload>: Send + Sync {
    /// Process one decoded payload.
    async fn handle(&self, payload: T, ctx: &JobRunContext) -> Result<(), HandlerError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Handler that receives the whole envelope rather than a typed payload.
///
/// Used for catch-all work such as forwarding every event downstream.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope, ctx: &JobRunContext) -> Result<(), HandlerError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that traits are object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageHandler<serde_json::Value>) {}

    #[allow(dead_code)]
    fn assert_envelope_handler_object_safe(_: &dyn EnvelopeHandler) {}
}
