//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the jobs and the outside world. Adapters implement these ports.
//!
//! ## Bus Ports
//!
//! - `BusAdministration` - Subscription existence, creation and listing
//! - `BusReceiver` - Receive under lease, settle, renew
//!
//! ## Handler Ports
//!
//! - `MessageHandler` - Typed business logic invoked by the pump
//! - `EnvelopeHandler` - Catch-all logic that sees the whole envelope
//! - `ScheduledJob` - Work driven by a recurring timer
//! - `EventPublisher` - Downstream publication of envelopes
//!
//! ## Collaborator Ports
//!
//! - `SecretProvider` - Secret resolution
//! - `CacheInvalidationSink` - Cached secret invalidation
//! - `MetricsApiClient` - Remote job run listing

mod bus_administration;
mod bus_receiver;
mod cache_invalidation;
mod event_publisher;
mod message_handler;
mod metrics_api;
mod scheduled_job;
mod secret_provider;

pub use bus_administration::{BusAdministration, BusError};
pub use bus_receiver::BusReceiver;
pub use cache_invalidation::{CacheInvalidationSink, InvalidationError};
pub use event_publisher::{EventPublisher, PublishError};
pub use message_handler::{EnvelopeHandler, MessageHandler};
pub use metrics_api::{MetricsApiClient, MetricsApiError};
pub use scheduled_job::ScheduledJob;
pub use secret_provider::{SecretError, SecretProvider};
