//! BackgroundJob - a subscription descriptor, a handler registry and pump
//! options, started as one unit.
//!
//! Start order: validate options, ensure the subscription, spawn the pump.
//! Any failure before the pump is spawned is returned to the caller, which
//! must not report the host ready.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::pump::{EventPump, PumpOptions, PumpStats, PumpStatsSnapshot};
use super::routing::HandlerRegistry;
use super::subscription_manager::SubscriptionManager;
use crate::domain::foundation::JobError;
use crate::domain::subscription::{SubscriptionDescriptor, SubscriptionMode, SubscriptionPath};
use crate::ports::{BusAdministration, BusReceiver};

#[derive(Debug)]
pub struct BackgroundJob {
    name: String,
    descriptor: SubscriptionDescriptor,
    registry: HandlerRegistry,
    options: PumpOptions,
}

impl BackgroundJob {
    pub fn new(
        name: impl Into<String>,
        descriptor: SubscriptionDescriptor,
        registry: HandlerRegistry,
        options: PumpOptions,
    ) -> Result<Self, JobError> {
        let name = name.into();
        options.validate()?;
        if registry.is_empty() && descriptor.mode() != SubscriptionMode::None {
            tracing::warn!(job = %name, "job has no handlers, every message will be unmatched");
        }
        Ok(Self {
            name,
            descriptor,
            registry,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &SubscriptionDescriptor {
        &self.descriptor
    }

    /// Ensures the subscription and spawns the pump.
    pub async fn start(
        self,
        admin: Arc<dyn BusAdministration>,
        receiver: Arc<dyn BusReceiver>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunningJob, JobError> {
        let subscription = SubscriptionManager::new(admin)
            .ensure_subscription(&self.descriptor)
            .await
            .map_err(|e| {
                tracing::error!(job = %self.name, error = %e, "background job failed to start");
                e
            })?;

        let path = subscription.path().cloned();
        let pump = EventPump::new(self.name.clone(), receiver, Arc::new(self.registry), self.options);
        let stats = pump.stats();
        let handle = tokio::spawn(async move { pump.run(subscription, shutdown).await });

        tracing::info!(
            job = %self.name,
            mode = %self.descriptor.mode(),
            subscription = path.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            "background job started"
        );

        Ok(RunningJob {
            name: self.name,
            subscription: path,
            stats,
            handle,
        })
    }
}

/// A started job; join it after sending the shutdown signal.
#[derive(Debug)]
pub struct RunningJob {
    name: String,
    subscription: Option<SubscriptionPath>,
    stats: Arc<PumpStats>,
    handle: JoinHandle<Result<(), JobError>>,
}

impl RunningJob {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The consumed subscription; `None` for mode `None`.
    pub fn subscription(&self) -> Option<&SubscriptionPath> {
        self.subscription.as_ref()
    }

    pub fn stats(&self) -> PumpStatsSnapshot {
        self.stats.snapshot()
    }

    /// Live counters, for readiness reporting.
    pub fn stats_handle(&self) -> Arc<PumpStats> {
        Arc::clone(&self.stats)
    }

    /// Waits for the pump to drain and stop.
    pub async fn join(self) -> Result<PumpStatsSnapshot, JobError> {
        match self.handle.await {
            Ok(result) => result.map(|()| self.stats.snapshot()),
            Err(join_error) => Err(JobError::Aborted {
                job: self.name,
                reason: join_error.to_string(),
            }),
        }
    }
}
