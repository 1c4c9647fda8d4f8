//! In-memory event publisher for tests and local runs.
//!
//! Captures every published envelope for assertions. A configured failure
//! makes every publish return an error, which exercises the transient path
//! of the jobs that publish.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::domain::envelope::Envelope;
use crate::ports::{EventPublisher, PublishError};

/// Captures published envelopes.
///
/// # Example
///
/// ```ignore
/// let publisher = Arc::new(InMemoryEventPublisher::new());
/// forwarder.handle(envelope, &ctx).await?;
/// assert_eq!(publisher.event_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    published: Mutex<Vec<Envelope>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn published_guard(&self) -> MutexGuard<'_, Vec<Envelope>> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Test Helpers ===

    /// Returns all published envelopes in publish order.
    pub fn published(&self) -> Vec<Envelope> {
        self.published_guard().clone()
    }

    /// Returns envelopes of a specific event type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<Envelope> {
        self.published_guard()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published_guard().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published_guard().iter().any(|e| e.event_type == event_type)
    }

    /// Clears captured envelopes (for test isolation).
    pub fn clear(&self) {
        self.published_guard().clear();
    }

    /// Makes every following publish fail with `reason`; `None` restores success.
    pub fn fail_with(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            reason.map(str::to_string);
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError> {
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(reason) = failure {
            return Err(PublishError::new(envelope.id.as_str(), reason));
        }
        self.published_guard().push(envelope);
        Ok(())
    }
}
