//! Metrics job - periodically lists finished remote job runs and publishes
//! one `job.run.finished` envelope per run.
//!
//! Each tick covers the runs completed since the previous successful tick;
//! the first tick looks back one interval. A failed tick leaves the window
//! start untouched so the next tick picks the runs up.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::dispatch::JobRunContext;
use crate::domain::envelope::Envelope;
use crate::domain::foundation::{EventId, HandlerError, Timestamp};
use crate::domain::metrics::{MetricsJobOptions, RunRecord, RunWindow, RUN_FINISHED_EVENT_TYPE};
use crate::ports::{EventPublisher, MetricsApiClient, MetricsApiError, ScheduledJob};

/// Source attribute of published run envelopes.
pub const METRICS_SOURCE: &str = "/background-jobs/metrics";

pub struct MetricsJob {
    client: Arc<dyn MetricsApiClient>,
    publisher: Arc<dyn EventPublisher>,
    options: MetricsJobOptions,
    last_tick: Mutex<Option<Timestamp>>,
}

impl MetricsJob {
    pub fn new(
        client: Arc<dyn MetricsApiClient>,
        publisher: Arc<dyn EventPublisher>,
        options: MetricsJobOptions,
    ) -> Self {
        Self {
            client,
            publisher,
            options,
            last_tick: Mutex::new(None),
        }
    }

    /// Collects runs finished before `now`, returning how many were published.
    pub async fn collect(&self, now: Timestamp) -> Result<usize, HandlerError> {
        let mut last_tick = self.last_tick.lock().await;
        let window = match *last_tick {
            Some(from) if !now.is_before(&from) => {
                RunWindow::new(from, now).map_err(|e| HandlerError::permanent(e.to_string()))?
            }
            _ => RunWindow::ending_at(now, self.options.interval()),
        };

        let runs = self
            .client
            .list_runs(window, self.options.max_runs())
            .await
            .map_err(api_fault)?;

        let count = runs.len();
        for run in &runs {
            log_run(run);
        }
        let envelopes = runs.iter().map(run_envelope).collect::<Result<Vec<_>, _>>()?;
        self.publisher
            .publish_all(envelopes)
            .await
            .map_err(|e| HandlerError::transient(e.to_string()))?;

        *last_tick = Some(now);
        tracing::info!(
            runs = count,
            from = %window.from().to_rfc3339(),
            to = %window.to().to_rfc3339(),
            "collected job run metrics"
        );
        Ok(count)
    }
}

#[async_trait]
impl ScheduledJob for MetricsJob {
    async fn tick(&self, _ctx: &JobRunContext) -> Result<(), HandlerError> {
        self.collect(Timestamp::now()).await.map(|_| ())
    }

    fn interval(&self) -> Duration {
        self.options.interval()
    }

    fn name(&self) -> &'static str {
        "MetricsJob"
    }
}

fn api_fault(err: MetricsApiError) -> HandlerError {
    match err {
        MetricsApiError::Unauthorized => HandlerError::permanent(err.to_string()),
        other => HandlerError::transient(other.to_string()),
    }
}

fn log_run(run: &RunRecord) {
    tracing::info!(
        job_id = run.job_id,
        run_id = run.run_id,
        run_name = %run.run_name,
        life_cycle_state = %run.state.life_cycle_state,
        result_state = run.state.result_state.as_deref().unwrap_or("-"),
        duration_ms = run.duration().map(|d| d.as_millis() as u64).unwrap_or(0),
        "job run finished"
    );
}

/// One envelope per run; the id is derived from the run id so republishing
/// the same run stays deduplicable downstream.
fn run_envelope(run: &RunRecord) -> Result<Envelope, HandlerError> {
    let data = serde_json::to_value(run).map_err(|e| HandlerError::permanent(e.to_string()))?;
    let time = if run.end_time > 0 {
        Some(Timestamp::from_unix_millis(run.end_time))
    } else {
        Some(Timestamp::now())
    };
    Ok(Envelope::new(
        EventId::from_string(format!("run-{}-{}", run.job_id, run.run_id)),
        RUN_FINISHED_EVENT_TYPE,
        METRICS_SOURCE,
    )
    .with_time(time)
    .with_json_data(data))
}
