//! HTTP adapters - endpoints the host serves next to its jobs.

mod health;

pub use health::{health_router, HealthState, ReadinessResponse};
