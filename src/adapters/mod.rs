//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the jobs to external systems:
//! - `bus` - message bus (in-memory, Redis Streams)
//! - `events` - envelope publishers (in-memory, logging)
//! - `secrets` - secret providers (environment, in-memory, cached)
//! - `metrics` - metrics API client (reqwest)
//! - `scheduler` - interval timer for scheduled jobs
//! - `http` - health endpoints (axum)

pub mod bus;
pub mod events;
pub mod http;
pub mod metrics;
pub mod scheduler;
pub mod secrets;

pub use bus::{InMemoryBus, RedisStreamPublisher, RedisStreamsBus};
pub use events::{InMemoryEventPublisher, LoggingEventPublisher};
pub use http::{health_router, HealthState};
pub use metrics::{build_client, HttpMetricsClient};
pub use scheduler::{IntervalScheduler, IntervalSchedulerConfig};
pub use secrets::{CachedSecretProvider, EnvSecretProvider, InMemorySecretProvider};
