//! Timer adapters for scheduled jobs.

mod interval;

pub use interval::{IntervalScheduler, IntervalSchedulerConfig};
