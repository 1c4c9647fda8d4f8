//! Publisher that writes envelopes to the log instead of a transport.
//!
//! Used as the observability sink of the metrics job when no downstream
//! destination is configured.

use async_trait::async_trait;

use crate::domain::envelope::Envelope;
use crate::ports::{EventPublisher, PublishError};

#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError> {
        let data = envelope.data.to_json().map(|v| v.to_string()).unwrap_or_default();
        tracing::info!(
            envelope_id = %envelope.id,
            event_type = %envelope.event_type,
            source = %envelope.source,
            data = %data,
            "envelope published"
        );
        Ok(())
    }
}
