//! Per-message context handed to every handler.

use tokio::sync::watch;

use crate::domain::envelope::{Envelope, RawMessage};

/// Message property that carries an upstream operation id.
pub const OPERATION_ID_PROPERTY: &str = "operation_id";

/// Cooperative cancellation signal shared by the handlers of one message.
///
/// Fires when the pump's shutdown grace period runs out.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    receiver: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // Keep the value readable after the sender is gone.
        drop(sender);
        Self { receiver }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if it never is.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Correlation id, delivery count and cancellation for one inbound message.
#[derive(Debug, Clone)]
pub struct JobRunContext {
    pub correlation_id: String,
    pub delivery_count: u32,
    pub cancellation: CancellationSignal,
}

impl JobRunContext {
    /// Builds the context for a decoded message.
    ///
    /// The correlation id is the message's `operation_id` property when set,
    /// otherwise the envelope id.
    pub fn for_message(raw: &RawMessage, envelope: &Envelope, cancellation: CancellationSignal) -> Self {
        let correlation_id = raw
            .property(OPERATION_ID_PROPERTY)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| envelope.id.to_string());
        Self {
            correlation_id,
            delivery_count: raw.delivery_count,
            cancellation,
        }
    }

    /// Context for work that did not come off the bus (timer ticks, tests).
    pub fn detached(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            delivery_count: 1,
            cancellation: CancellationSignal::never(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventId;
    use std::time::Duration;

    fn envelope() -> Envelope {
        Envelope::new(EventId::from_string("E-1"), "t", "s")
    }

    #[test]
    fn correlation_defaults_to_envelope_id() {
        let raw = RawMessage::new("m-1", Vec::new()).with_delivery_count(3);
        let ctx = JobRunContext::for_message(&raw, &envelope(), CancellationSignal::never());
        assert_eq!(ctx.correlation_id, "E-1");
        assert_eq!(ctx.delivery_count, 3);
    }

    #[test]
    fn correlation_prefers_operation_id_property() {
        let raw = RawMessage::new("m-1", Vec::new()).with_property("operation_id", "op-42");
        let ctx = JobRunContext::for_message(&raw, &envelope(), CancellationSignal::never());
        assert_eq!(ctx.correlation_id, "op-42");
    }

    #[test]
    fn never_signal_is_not_cancelled() {
        assert!(!CancellationSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_send() {
        let (tx, rx) = watch::channel(false);
        let signal = CancellationSignal::new(rx);
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn never_signal_does_not_resolve() {
        let signal = CancellationSignal::never();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
