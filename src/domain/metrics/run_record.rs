//! Job run records reported by the metrics API.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Event type published for every finished run.
pub const RUN_FINISHED_EVENT_TYPE: &str = "job.run.finished";

/// Lifecycle and result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub life_cycle_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state: Option<String>,
    #[serde(default)]
    pub state_message: String,
}

impl RunState {
    /// True when the run terminated with `SUCCESS`.
    pub fn succeeded(&self) -> bool {
        self.result_state.as_deref() == Some("SUCCESS")
    }
}

/// One run of a remote job, as listed by the metrics API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: u64,
    pub run_id: u64,
    #[serde(default)]
    pub run_name: String,
    pub state: RunState,
    /// Unix epoch milliseconds.
    pub start_time: i64,
    /// Unix epoch milliseconds; 0 while the run is still going.
    #[serde(default)]
    pub end_time: i64,
}

impl RunRecord {
    pub fn duration(&self) -> Option<Duration> {
        if self.end_time < self.start_time || self.end_time == 0 {
            return None;
        }
        Some(Duration::from_millis((self.end_time - self.start_time) as u64))
    }
}

/// Half-open time window `[from, to)` of completed runs to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    from: Timestamp,
    to: Timestamp,
}

impl RunWindow {
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self, ValidationError> {
        if to.is_before(&from) {
            return Err(ValidationError::invalid_format(
                "run_window",
                "end precedes start",
            ));
        }
        Ok(Self { from, to })
    }

    /// Window ending at `to` and reaching `span` back.
    pub fn ending_at(to: Timestamp, span: Duration) -> Self {
        Self {
            from: to.minus(span),
            to,
        }
    }

    pub fn from(&self) -> Timestamp {
        self.from
    }

    pub fn to(&self) -> Timestamp {
        self.to
    }

    /// True when `run` finished inside the window.
    pub fn contains_end_of(&self, run: &RunRecord) -> bool {
        run.end_time > 0 && run.end_time >= self.from.as_unix_millis() && run.end_time < self.to.as_unix_millis()
    }
}
