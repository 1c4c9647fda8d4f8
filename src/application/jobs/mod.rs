//! Jobs - the handler sets and timers the host runs.
//!
//! - `secret_invalidation` - drops cached secrets on rotation events
//! - `cloud_event_forwarding` - republishes every received envelope
//! - `metrics` - timer-driven collection of remote job runs

mod cloud_event_forwarding;
mod metrics;
mod secret_invalidation;

pub use cloud_event_forwarding::{forwarding_registry, CloudEventForwarder};
pub use metrics::{MetricsJob, METRICS_SOURCE};
pub use secret_invalidation::{secret_invalidation_registry, SecretInvalidationHandler};
