//! Metrics module - remote job runs collected on a timer.

mod options;
mod run_record;

pub use options::{MetricsJobOptions, DEFAULT_COLLECTION_INTERVAL, DEFAULT_MAX_RUNS, MAX_RUNS_LIMIT};
pub use run_record::{RunRecord, RunState, RunWindow, RUN_FINISHED_EVENT_TYPE};
