//! Application layer - subscription lifecycle, routing and the event pump.
//!
//! This layer coordinates domain types and ports; it holds no transport code.

pub mod background_job;
pub mod jobs;
pub mod pump;
pub mod routing;
pub mod subscription_manager;

pub use background_job::{BackgroundJob, RunningJob};
pub use pump::{EventPump, PumpOptions, PumpStats, PumpStatsSnapshot};
pub use routing::{EnvelopeRegistration, HandlerRegistry, Registration, Resolution};
pub use subscription_manager::{ActiveSubscription, SubscriptionManager};
