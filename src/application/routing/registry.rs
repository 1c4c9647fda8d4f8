//! HandlerRegistry - ordered type trial over registered payload types.
//!
//! Each registration knows how to decode the envelope payload into its own
//! type. Resolution walks the registrations in order and takes the first one
//! whose event-type filter, decode attempt and predicate all accept the
//! envelope. Overlapping registrations are allowed; the earlier one wins.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;

use crate::domain::dispatch::JobRunContext;
use crate::domain::envelope::{decode_payload, AdditionalMembers, Envelope, Payload};
use crate::domain::foundation::HandlerError;
use crate::ports::{EnvelopeHandler, MessageHandler};

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Invocation = Box<dyn FnOnce(JobRunContext) -> BoxFuture<'static, Result<(), HandlerError>> + Send>;

/// One `(payload type, predicate, handler)` entry.
pub struct Registration<T: Payload> {
    handler: Arc<dyn MessageHandler<T>>,
    event_types: Vec<String>,
    predicate: Option<Predicate<T>>,
}

impl<T: Payload> Registration<T> {
    pub fn new(handler: Arc<dyn MessageHandler<T>>) -> Self {
        Self {
            handler,
            event_types: Vec::new(),
            predicate: None,
        }
    }

    /// Restricts the registration to envelopes of `event_type`.
    ///
    /// May be called repeatedly; without any call every type is accepted.
    pub fn for_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Adds a predicate evaluated on the decoded payload.
    pub fn when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    fn accepts_type(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event_type)
    }
}

/// Type-erased view of a `Registration<T>`.
trait Route: Send + Sync {
    fn handler_name(&self) -> &'static str;

    fn prepare(&self, envelope: &Envelope, members: AdditionalMembers) -> Option<PreparedDispatch>;
}

impl<T: Payload> Route for Registration<T> {
    fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    fn prepare(&self, envelope: &Envelope, members: AdditionalMembers) -> Option<PreparedDispatch> {
        if !self.accepts_type(&envelope.event_type) {
            return None;
        }
        let payload = match decode_payload::<T>(envelope, members) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::trace!(
                    envelope_id = %envelope.id,
                    handler = self.handler.name(),
                    error = %err,
                    "registration declined payload"
                );
                return None;
            }
        };
        if let Some(predicate) = &self.predicate {
            if !predicate(&payload) {
                return None;
            }
        }

        let handler = Arc::clone(&self.handler);
        Some(PreparedDispatch {
            handler_name: handler.name(),
            invoke: Box::new(move |ctx: JobRunContext| {
                async move { handler.handle(payload, &ctx).await }.boxed()
            }),
        })
    }
}

/// Registration whose handler takes the whole envelope.
///
/// Accepts every envelope of the listed event types (every envelope when
/// none are listed), so it belongs after the typed registrations.
pub struct EnvelopeRegistration {
    handler: Arc<dyn EnvelopeHandler>,
    event_types: Vec<String>,
}

impl EnvelopeRegistration {
    pub fn new(handler: Arc<dyn EnvelopeHandler>) -> Self {
        Self {
            handler,
            event_types: Vec::new(),
        }
    }

    pub fn for_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }
}

impl Route for EnvelopeRegistration {
    fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    fn prepare(&self, envelope: &Envelope, _members: AdditionalMembers) -> Option<PreparedDispatch> {
        let accepted = self.event_types.is_empty()
            || self.event_types.iter().any(|t| *t == envelope.event_type);
        if !accepted {
            return None;
        }
        let handler = Arc::clone(&self.handler);
        let envelope = envelope.clone();
        Some(PreparedDispatch {
            handler_name: handler.name(),
            invoke: Box::new(move |ctx: JobRunContext| {
                async move { handler.handle(envelope, &ctx).await }.boxed()
            }),
        })
    }
}

/// A matched handler bound to its decoded payload, ready to run.
pub struct PreparedDispatch {
    handler_name: &'static str,
    invoke: Invocation,
}

impl PreparedDispatch {
    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    /// Runs the handler.
    pub async fn invoke(self, ctx: JobRunContext) -> Result<(), HandlerError> {
        (self.invoke)(ctx).await
    }
}

impl fmt::Debug for PreparedDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedDispatch")
            .field("handler_name", &self.handler_name)
            .finish()
    }
}

/// Result of routing one envelope.
#[derive(Debug)]
pub enum Resolution {
    Matched(PreparedDispatch),
    NoMatch,
}

/// Immutable, ordered set of registrations for one job.
pub struct HandlerRegistry {
    routes: Vec<Box<dyn Route>>,
    additional_members: AdditionalMembers,
}

impl HandlerRegistry {
    pub fn new(additional_members: AdditionalMembers) -> Self {
        Self {
            routes: Vec::new(),
            additional_members,
        }
    }

    /// Appends a registration; earlier registrations take precedence.
    pub fn register<T: Payload>(mut self, registration: Registration<T>) -> Self {
        self.routes.push(Box::new(registration));
        self
    }

    /// Appends an envelope-level registration.
    pub fn register_envelope(mut self, registration: EnvelopeRegistration) -> Self {
        self.routes.push(Box::new(registration));
        self
    }

    pub fn additional_members(&self) -> AdditionalMembers {
        self.additional_members
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handler names in registration order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.handler_name()).collect()
    }

    /// Selects the first registration that accepts the envelope.
    pub fn resolve(&self, envelope: &Envelope) -> Resolution {
        self.routes
            .iter()
            .find_map(|route| route.prepare(envelope, self.additional_members))
            .map_or(Resolution::NoMatch, Resolution::Matched)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_names())
            .field("additional_members", &self.additional_members)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventId;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct OrderV1 {
        id: String,
        amount: u64,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct OrderV2 {
        id: String,
        amount: u64,
        currency: String,
    }

    struct Recording<T> {
        name: &'static str,
        seen: Mutex<Vec<T>>,
    }

    impl<T> Recording<T> {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl<T: Payload> MessageHandler<T> for Recording<T> {
        async fn handle(&self, payload: T, _ctx: &JobRunContext) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(payload);
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn order_envelope(data: serde_json::Value) -> Envelope {
        Envelope::new(EventId::from_string("E-1"), "order.created", "/shop").with_json_data(data)
    }

    fn matched_name(resolution: &Resolution) -> Option<&'static str> {
        match resolution {
            Resolution::Matched(dispatch) => Some(dispatch.handler_name()),
            Resolution::NoMatch => None,
        }
    }

    fn versioned_registry(members: AdditionalMembers) -> HandlerRegistry {
        HandlerRegistry::new(members)
            .register(Registration::<OrderV2>::new(Recording::<OrderV2>::new("v2")))
            .register(Registration::<OrderV1>::new(Recording::<OrderV1>::new("v1")))
    }

    #[test]
    fn newer_shape_selects_newer_handler() {
        let registry = versioned_registry(AdditionalMembers::Error);
        let envelope = order_envelope(json!({"id": "o-1", "amount": 5, "currency": "EUR"}));
        assert_eq!(matched_name(&registry.resolve(&envelope)), Some("v2"));
    }

    #[test]
    fn legacy_shape_falls_through_to_legacy_handler() {
        let registry = versioned_registry(AdditionalMembers::Error);
        let envelope = order_envelope(json!({"id": "o-1", "amount": 5}));
        assert_eq!(matched_name(&registry.resolve(&envelope)), Some("v1"));
    }

    #[test]
    fn strict_mode_rejects_superset_for_legacy_type() {
        let registry = HandlerRegistry::new(AdditionalMembers::Error)
            .register(Registration::<OrderV1>::new(Recording::<OrderV1>::new("v1")));
        let envelope = order_envelope(json!({"id": "o-1", "amount": 5, "currency": "EUR"}));
        assert_eq!(matched_name(&registry.resolve(&envelope)), None);
    }

    #[test]
    fn lenient_mode_first_registration_wins_on_overlap() {
        let registry = HandlerRegistry::new(AdditionalMembers::Ignore)
            .register(Registration::<OrderV1>::new(Recording::<OrderV1>::new("v1")))
            .register(Registration::<OrderV2>::new(Recording::<OrderV2>::new("v2")));
        let envelope = order_envelope(json!({"id": "o-1", "amount": 5, "currency": "EUR"}));
        assert_eq!(matched_name(&registry.resolve(&envelope)), Some("v1"));
    }

    #[test]
    fn event_type_filter_excludes_other_types() {
        let registry = HandlerRegistry::new(AdditionalMembers::Ignore).register(
            Registration::<OrderV1>::new(Recording::<OrderV1>::new("v1")).for_event_type("order.cancelled"),
        );
        let envelope = order_envelope(json!({"id": "o-1", "amount": 5}));
        assert_eq!(matched_name(&registry.resolve(&envelope)), None);
    }

    #[test]
    fn predicate_selects_among_same_type() {
        let registry = HandlerRegistry::new(AdditionalMembers::Error)
            .register(Registration::<OrderV1>::new(Recording::<OrderV1>::new("large")).when(|o| o.amount >= 100))
            .register(Registration::<OrderV1>::new(Recording::<OrderV1>::new("small")));

        let small = order_envelope(json!({"id": "o-1", "amount": 5}));
        let large = order_envelope(json!({"id": "o-2", "amount": 500}));

        assert_eq!(matched_name(&registry.resolve(&small)), Some("small"));
        assert_eq!(matched_name(&registry.resolve(&large)), Some("large"));
    }

    #[test]
    fn empty_registry_never_matches() {
        let registry = HandlerRegistry::new(AdditionalMembers::Error);
        assert!(registry.is_empty());
        assert_eq!(matched_name(&registry.resolve(&order_envelope(json!({})))), None);
    }

    #[tokio::test]
    async fn invoking_dispatch_runs_only_the_matched_handler() {
        let v2 = Recording::<OrderV2>::new("v2");
        let v1 = Recording::<OrderV1>::new("v1");
        let registry = HandlerRegistry::new(AdditionalMembers::Error)
            .register(Registration::<OrderV2>::new(v2.clone()))
            .register(Registration::<OrderV1>::new(v1.clone()));

        let envelope = order_envelope(json!({"id": "o-1", "amount": 5}));
        let Resolution::Matched(dispatch) = registry.resolve(&envelope) else {
            panic!("expected a match");
        };
        dispatch.invoke(JobRunContext::detached("E-1")).await.unwrap();

        assert_eq!(v1.count(), 1);
        assert_eq!(v2.count(), 0);
    }

    struct CatchAll;

    #[async_trait]
    impl EnvelopeHandler for CatchAll {
        async fn handle(&self, _: Envelope, _: &JobRunContext) -> Result<(), HandlerError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "catch-all"
        }
    }

    #[test]
    fn envelope_registration_catches_what_typed_ones_decline() {
        let registry = versioned_registry(AdditionalMembers::Error)
            .register_envelope(EnvelopeRegistration::new(Arc::new(CatchAll)));

        let legacy = order_envelope(json!({"id": "o-1", "amount": 5}));
        let unknown = order_envelope(json!({"shape": "unrelated"}));

        assert_eq!(matched_name(&registry.resolve(&legacy)), Some("v1"));
        assert_eq!(matched_name(&registry.resolve(&unknown)), Some("catch-all"));
    }

    #[test]
    fn envelope_registration_honours_type_filter() {
        let registry = HandlerRegistry::new(AdditionalMembers::Error).register_envelope(
            EnvelopeRegistration::new(Arc::new(CatchAll)).for_event_type("order.cancelled"),
        );
        assert_eq!(matched_name(&registry.resolve(&order_envelope(json!({})))), None);
    }

    #[test]
    fn handler_names_follow_registration_order() {
        let registry = versioned_registry(AdditionalMembers::Error);
        assert_eq!(registry.handler_names(), vec!["v2", "v1"]);
        assert_eq!(registry.len(), 2);
    }
}
