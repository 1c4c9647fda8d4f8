//! IntervalScheduler - runs a `ScheduledJob` on a recurring timer.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `run_on_start` | false | Tick once immediately instead of after the first interval |
//!
//! The period comes from the job itself. A failed tick is logged and the
//! next tick runs on schedule; ticks never overlap.
//!
//! ## Graceful Shutdown
//!
//! The scheduler listens for a shutdown signal and lets a tick in progress
//! finish before stopping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::dispatch::JobRunContext;
use crate::domain::foundation::{HandlerError, JobError};
use crate::ports::ScheduledJob;

#[derive(Debug, Clone, Default)]
pub struct IntervalSchedulerConfig {
    pub run_on_start: bool,
}

impl IntervalSchedulerConfig {
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }
}

pub struct IntervalScheduler {
    job: Arc<dyn ScheduledJob>,
    config: IntervalSchedulerConfig,
    ticks: AtomicU64,
}

impl IntervalScheduler {
    pub fn new(job: Arc<dyn ScheduledJob>) -> Self {
        Self::with_config(job, IntervalSchedulerConfig::default())
    }

    pub fn with_config(job: Arc<dyn ScheduledJob>, config: IntervalSchedulerConfig) -> Self {
        Self {
            job,
            config,
            ticks: AtomicU64::new(0),
        }
    }

    /// Number of ticks run so far, failed ones included.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Runs ticks until the shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), JobError> {
        let period = self.job.interval();
        if period.is_zero() {
            return Err(JobError::configuration(format!(
                "scheduled job '{}' has a zero interval",
                self.job.name()
            )));
        }

        let start = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(job = self.job.name(), period_ms = period.as_millis() as u64, "scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    let _ = self.tick_once().await;
                }
            }
        }
        tracing::info!(job = self.job.name(), ticks = self.ticks(), "scheduler stopped");
        Ok(())
    }

    /// Runs exactly one tick, logging a failure.
    pub async fn tick_once(&self) -> Result<(), HandlerError> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = JobRunContext::detached(format!("{}-tick-{}", self.job.name(), n));
        let result = self.job.tick(&ctx).await;
        if let Err(e) = &result {
            tracing::warn!(
                job = self.job.name(),
                correlation_id = %ctx.correlation_id,
                transient = e.is_transient(),
                error = %e,
                "scheduled tick failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingJob {
        calls: AtomicUsize,
        period: Duration,
        fail: bool,
    }

    impl CountingJob {
        fn new(period: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                period,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        async fn tick(&self, _ctx: &JobRunContext) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::transient("metrics API down"));
            }
            Ok(())
        }

        fn interval(&self) -> Duration {
            self.period
        }

        fn name(&self) -> &'static str {
            "CountingJob"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_each_period_until_shutdown() {
        let job = Arc::new(CountingJob::new(Duration::from_secs(60)));
        let scheduler = Arc::new(IntervalScheduler::new(job.clone()));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(140)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_does_not_stop_the_schedule() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..CountingJob::new(Duration::from_secs(10))
        });
        let scheduler = Arc::new(IntervalScheduler::with_config(
            job.clone(),
            IntervalSchedulerConfig::default().with_run_on_start(true),
        ));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });

        time::sleep(Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.ticks(), 3);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let scheduler = IntervalScheduler::new(Arc::new(CountingJob::new(Duration::ZERO)));
        let (_tx, rx) = watch::channel(false);

        let result = scheduler.run(rx).await;

        assert!(matches!(result, Err(JobError::Configuration(_))));
    }

    #[tokio::test]
    async fn tick_once_returns_job_result() {
        let job = Arc::new(CountingJob::new(Duration::from_secs(1)));
        let scheduler = IntervalScheduler::new(job.clone());

        assert!(scheduler.tick_once().await.is_ok());
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
    }
}
