//! Cloud-event forwarding job - republishes every received envelope.

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::routing::{EnvelopeRegistration, HandlerRegistry};
use crate::domain::dispatch::JobRunContext;
use crate::domain::envelope::{AdditionalMembers, Envelope};
use crate::domain::foundation::HandlerError;
use crate::ports::{EnvelopeHandler, EventPublisher};

/// Forwards envelopes unchanged to a downstream publisher.
///
/// Publish failures are transient: the bus redelivers and the forward is
/// retried.
pub struct CloudEventForwarder {
    publisher: Arc<dyn EventPublisher>,
}

impl CloudEventForwarder {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EnvelopeHandler for CloudEventForwarder {
    async fn handle(&self, envelope: Envelope, ctx: &JobRunContext) -> Result<(), HandlerError> {
        let envelope_id = envelope.id.clone();
        self.publisher
            .publish(envelope)
            .await
            .map_err(|e| HandlerError::transient(e.to_string()))?;
        tracing::debug!(
            envelope_id = %envelope_id,
            correlation_id = %ctx.correlation_id,
            "forwarded envelope"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CloudEventForwarder"
    }
}

/// Registry forwarding every envelope to `publisher`.
pub fn forwarding_registry(
    publisher: Arc<dyn EventPublisher>,
    additional_members: AdditionalMembers,
) -> HandlerRegistry {
    HandlerRegistry::new(additional_members)
        .register_envelope(EnvelopeRegistration::new(Arc::new(CloudEventForwarder::new(publisher))))
}
