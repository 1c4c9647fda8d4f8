//! EventPump - pulls messages from a subscription and settles each one.
//!
//! Per message: `Received -> Decoding -> Routing -> Handling -> settled` as
//! one of `Completed`, `Abandoned(reason)` or `DeadLettered(reason)`.
//!
//! ## Settlement
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | envelope does not decode | `DeadLettered("malformed envelope")` |
//! | no registration accepts it | per `UnmatchedPolicy` |
//! | handler succeeded | `Completed` |
//! | transient fault | `Abandoned(reason)` (the bus redelivers) |
//! | permanent fault | `DeadLettered(reason)` |
//! | grace period ran out mid-handler | `Abandoned("cancelled at shutdown")` |
//!
//! ## Graceful Shutdown
//!
//! On the shutdown signal workers stop receiving and finish the message in
//! hand. Whatever is still running once `shutdown_grace` elapses is
//! cancelled and abandoned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use super::options::PumpOptions;
use super::stats::PumpStats;
use crate::application::routing::{HandlerRegistry, PreparedDispatch, Resolution};
use crate::application::subscription_manager::ActiveSubscription;
use crate::domain::dispatch::{
    CancellationSignal, JobRunContext, MessageOutcome, CANCELLED_AT_SHUTDOWN, MALFORMED_ENVELOPE,
};
use crate::domain::envelope::{decode, Envelope, RawMessage};
use crate::domain::foundation::{HandlerError, JobError};
use crate::domain::subscription::SubscriptionPath;
use crate::ports::{BusError, BusReceiver};

/// Longest pause after a failed receive call.
const MAX_RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// Consumer loop for one job.
#[derive(Clone)]
pub struct EventPump {
    job_name: Arc<str>,
    receiver: Arc<dyn BusReceiver>,
    registry: Arc<HandlerRegistry>,
    options: PumpOptions,
    stats: Arc<PumpStats>,
}

impl EventPump {
    pub fn new(
        job_name: impl Into<String>,
        receiver: Arc<dyn BusReceiver>,
        registry: Arc<HandlerRegistry>,
        options: PumpOptions,
    ) -> Self {
        Self {
            job_name: Arc::from(job_name.into()),
            receiver,
            registry,
            options,
            stats: Arc::new(PumpStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PumpStats> {
        Arc::clone(&self.stats)
    }

    pub fn options(&self) -> &PumpOptions {
        &self.options
    }

    /// Runs the workers until `shutdown` fires, then drains and releases
    /// the subscription handle.
    ///
    /// An inert subscription is never polled; the call just waits for shutdown.
    pub async fn run(
        &self,
        subscription: ActiveSubscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), JobError> {
        let Some(path) = subscription.path().cloned() else {
            tracing::info!(job = %self.job_name, "no subscription to consume, pump idle");
            wait_for_shutdown(&mut shutdown).await;
            subscription.release();
            return Ok(());
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let workers: Vec<JoinHandle<()>> = (0..self.options.concurrency)
            .map(|index| {
                let pump = self.clone();
                let path = path.clone();
                let shutdown = shutdown.clone();
                let cancellation = CancellationSignal::new(cancel_rx.clone());
                tokio::spawn(async move { pump.worker_loop(index, path, shutdown, cancellation).await })
            })
            .collect();

        tracing::info!(
            job = %self.job_name,
            subscription = %path,
            concurrency = self.options.concurrency,
            handlers = ?self.registry.handler_names(),
            "event pump started"
        );

        wait_for_shutdown(&mut shutdown).await;
        tracing::info!(job = %self.job_name, "shutdown requested, draining in-flight messages");

        let drain = futures::future::join_all(workers);
        tokio::pin!(drain);
        let results = match time::timeout(self.options.shutdown_grace, &mut drain).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!(
                    job = %self.job_name,
                    grace_ms = self.options.shutdown_grace.as_millis() as u64,
                    "grace period elapsed, abandoning in-flight messages"
                );
                let _ = cancel_tx.send(true);
                drain.await
            }
        };

        subscription.release();

        let stats = self.stats.snapshot();
        tracing::info!(
            job = %self.job_name,
            received = stats.received,
            completed = stats.completed,
            abandoned = stats.abandoned,
            dead_lettered = stats.dead_lettered,
            "event pump stopped"
        );

        for result in results {
            if let Err(join_error) = result {
                return Err(JobError::Aborted {
                    job: self.job_name.to_string(),
                    reason: join_error.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn worker_loop(
        &self,
        index: usize,
        path: SubscriptionPath,
        mut shutdown: watch::Receiver<bool>,
        cancellation: CancellationSignal,
    ) {
        let mut failures: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.receiver.receive(&path, 1, self.options.receive_wait) => result,
            };

            match received {
                Ok(messages) => {
                    failures = 0;
                    for raw in messages {
                        self.process_message(&path, raw, cancellation.clone()).await;
                    }
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let backoff = receive_backoff(self.options.receive_wait, failures);
                    tracing::warn!(
                        job = %self.job_name,
                        worker = index,
                        error = %err,
                        backoff_ms = backoff.as_millis() as u64,
                        "receive failed"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = time::sleep(backoff) => {}
                    }
                }
            }
        }
        tracing::debug!(job = %self.job_name, worker = index, "worker stopped");
    }

    /// Decodes, routes, handles and settles one message.
    ///
    /// Also usable without `run` for driving a pump by hand.
    pub async fn process_message(
        &self,
        path: &SubscriptionPath,
        raw: RawMessage,
        cancellation: CancellationSignal,
    ) -> MessageOutcome {
        self.stats.record_received();

        let envelope = match decode(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    job = %self.job_name,
                    message_id = %raw.message_id,
                    error = %err,
                    "could not decode envelope"
                );
                let outcome = MessageOutcome::dead_lettered(MALFORMED_ENVELOPE);
                self.settle(path, &raw, None, &outcome).await;
                return outcome;
            }
        };

        let outcome = match self.registry.resolve(&envelope) {
            Resolution::NoMatch => self.options.unmatched.outcome(),
            Resolution::Matched(dispatch) => {
                let ctx = JobRunContext::for_message(&raw, &envelope, cancellation.clone());
                self.handle(path, &raw, &envelope, dispatch, ctx, &cancellation)
                    .await
            }
        };

        self.settle(path, &raw, Some(&envelope), &outcome).await;
        outcome
    }

    async fn handle(
        &self,
        path: &SubscriptionPath,
        raw: &RawMessage,
        envelope: &Envelope,
        dispatch: PreparedDispatch,
        ctx: JobRunContext,
        cancellation: &CancellationSignal,
    ) -> MessageOutcome {
        let handler = dispatch.handler_name();
        let renewal = self.spawn_lease_renewal(path.clone(), raw.clone());

        let result = tokio::select! {
            result = dispatch.invoke(ctx) => Some(result),
            _ = cancellation.cancelled() => None,
        };

        // Settlement supersedes any renewal still in flight.
        renewal.abort();
        let _ = renewal.await;

        match result {
            Some(Ok(())) => MessageOutcome::Completed,
            Some(Err(HandlerError::Transient(reason))) => {
                tracing::debug!(
                    envelope_id = %envelope.id,
                    handler,
                    reason = %reason,
                    "transient handler fault"
                );
                MessageOutcome::Abandoned(reason)
            }
            Some(Err(HandlerError::Permanent(reason))) => MessageOutcome::DeadLettered(reason),
            None => {
                tracing::warn!(
                    envelope_id = %envelope.id,
                    handler,
                    "handler cancelled at shutdown"
                );
                MessageOutcome::abandoned(CANCELLED_AT_SHUTDOWN)
            }
        }
    }

    fn spawn_lease_renewal(&self, path: SubscriptionPath, raw: RawMessage) -> JoinHandle<()> {
        let receiver = Arc::clone(&self.receiver);
        let stats = Arc::clone(&self.stats);
        let period = self.options.lease_renewal_interval;
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                match receiver.renew_lease(&path, &raw).await {
                    Ok(()) => stats.record_lease_renewal(),
                    Err(BusError::LeaseLost { .. }) => {
                        tracing::warn!(message_id = %raw.message_id, "lease lost during handling");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(message_id = %raw.message_id, error = %err, "lease renewal failed");
                    }
                }
            }
        })
    }

    async fn settle(
        &self,
        path: &SubscriptionPath,
        raw: &RawMessage,
        envelope: Option<&Envelope>,
        outcome: &MessageOutcome,
    ) {
        let result = match outcome {
            MessageOutcome::Completed => self.receiver.complete(path, raw).await,
            MessageOutcome::Abandoned(_) => self.receiver.abandon(path, raw).await,
            MessageOutcome::DeadLettered(reason) => {
                self.receiver.dead_letter(path, raw, reason).await
            }
        };
        self.stats.record_outcome(outcome);

        let envelope_id = envelope.map(|e| e.id.as_str()).unwrap_or("-");
        let event_type = envelope.map(|e| e.event_type.as_str()).unwrap_or("-");
        let reason = outcome.reason().unwrap_or("");

        if let Err(err) = result {
            self.stats.record_settle_failure();
            tracing::error!(
                job = %self.job_name,
                message_id = %raw.message_id,
                envelope_id,
                event_type,
                outcome = %outcome,
                error = %err,
                "settlement failed"
            );
            return;
        }

        match outcome {
            MessageOutcome::Completed => tracing::info!(
                job = %self.job_name,
                envelope_id,
                event_type,
                delivery_count = raw.delivery_count,
                "message completed"
            ),
            MessageOutcome::Abandoned(_) => tracing::warn!(
                job = %self.job_name,
                message_id = %raw.message_id,
                envelope_id,
                event_type,
                delivery_count = raw.delivery_count,
                reason,
                "message abandoned"
            ),
            MessageOutcome::DeadLettered(_) => tracing::warn!(
                job = %self.job_name,
                message_id = %raw.message_id,
                envelope_id,
                event_type,
                reason,
                "message dead-lettered"
            ),
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn receive_backoff(receive_wait: Duration, failures: u32) -> Duration {
    let base = receive_wait.min(MAX_RECEIVE_BACKOFF) / 10;
    let factor = 1u32 << failures.min(4);
    (base * factor).min(MAX_RECEIVE_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBus;
    use crate::application::routing::Registration;
    use crate::domain::dispatch::UnmatchedPolicy;
    use crate::domain::envelope::{encode, AdditionalMembers};
    use crate::domain::foundation::EventId;
    use crate::ports::{BusAdministration, MessageHandler};
    use async_trait::async_trait;
    use serde_json::json;

    struct Failing(HandlerError);

    #[async_trait]
    impl MessageHandler<serde_json::Value> for Failing {
        async fn handle(&self, _: serde_json::Value, _: &JobRunContext) -> Result<(), HandlerError> {
            Err(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl MessageHandler<serde_json::Value> for Slow {
        async fn handle(&self, _: serde_json::Value, _: &JobRunContext) -> Result<(), HandlerError> {
            time::sleep(self.0).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Slow"
        }
    }

    async fn bus_with_subscription() -> (Arc<InMemoryBus>, SubscriptionPath) {
        let bus = Arc::new(InMemoryBus::new());
        bus.create_subscription("orders", "jobs").await.unwrap();
        (bus, SubscriptionPath::new("orders", "jobs"))
    }

    fn message(id: &str, event_type: &str) -> RawMessage {
        encode(
            &Envelope::new(EventId::from_string(id), event_type, "/tests")
                .with_json_data(json!({"value": 1})),
        )
    }

    /// Publishes `raw` and takes it back off the bus under lease.
    async fn leased(bus: &InMemoryBus, path: &SubscriptionPath, raw: RawMessage) -> RawMessage {
        bus.publish(&path.topic, raw).await;
        bus.receive(path, 1, Duration::from_millis(50))
            .await
            .unwrap()
            .remove(0)
    }

    fn pump(bus: &Arc<InMemoryBus>, registry: HandlerRegistry, options: PumpOptions) -> EventPump {
        EventPump::new("test", bus.clone(), Arc::new(registry), options)
    }

    fn single(handler: impl MessageHandler<serde_json::Value> + 'static) -> HandlerRegistry {
        HandlerRegistry::new(AdditionalMembers::Error)
            .register(Registration::<serde_json::Value>::new(Arc::new(handler)))
    }

    #[tokio::test]
    async fn permanent_fault_dead_letters_with_reason() {
        let (bus, path) = bus_with_subscription().await;
        let pump = pump(&bus, single(Failing(HandlerError::permanent("bad order"))), PumpOptions::default());
        let raw = leased(&bus, &path, message("E-1", "order.created")).await;

        let outcome = pump.process_message(&path, raw, CancellationSignal::never()).await;

        assert_eq!(outcome, MessageOutcome::DeadLettered("bad order".to_string()));
        assert_eq!(bus.dead_lettered(&path).await[0].1, "bad order");
    }

    #[tokio::test]
    async fn transient_fault_abandons() {
        let (bus, path) = bus_with_subscription().await;
        let pump = pump(&bus, single(Failing(HandlerError::transient("timeout"))), PumpOptions::default());
        let raw = leased(&bus, &path, message("E-1", "order.created")).await;

        let outcome = pump.process_message(&path, raw, CancellationSignal::never()).await;

        assert_eq!(outcome, MessageOutcome::abandoned("timeout"));
        assert_eq!(bus.abandoned_count(&path).await, 1);
        assert_eq!(bus.pending_count(&path).await, 1);
    }

    #[tokio::test]
    async fn malformed_body_dead_letters() {
        let (bus, path) = bus_with_subscription().await;
        let pump = pump(&bus, HandlerRegistry::new(AdditionalMembers::Error), PumpOptions::default());
        let raw = leased(&bus, &path, RawMessage::new("m-1", "not json")).await;

        let outcome = pump.process_message(&path, raw, CancellationSignal::never()).await;

        assert_eq!(outcome, MessageOutcome::DeadLettered("malformed envelope".to_string()));
        assert_eq!(pump.stats().snapshot().dead_lettered, 1);
        assert_eq!(pump.stats().snapshot().settle_failures, 0);
    }

    #[tokio::test]
    async fn unmatched_completes_under_complete_policy() {
        let (bus, path) = bus_with_subscription().await;
        let options = PumpOptions::default().with_unmatched(UnmatchedPolicy::Complete);
        let pump = pump(&bus, HandlerRegistry::new(AdditionalMembers::Error), options);
        let raw = leased(&bus, &path, message("E-1", "unknown.event")).await;

        let outcome = pump.process_message(&path, raw, CancellationSignal::never()).await;

        assert_eq!(outcome, MessageOutcome::Completed);
        assert_eq!(bus.completed(&path).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lease_is_renewed_while_handler_runs() {
        let (bus, path) = bus_with_subscription().await;
        let options = PumpOptions::default().with_lease_renewal_interval(Duration::from_millis(100));
        let pump = pump(&bus, single(Slow(Duration::from_millis(250))), options);
        let raw = leased(&bus, &path, message("E-1", "order.created")).await;

        let outcome = pump.process_message(&path, raw, CancellationSignal::never()).await;

        assert_eq!(outcome, MessageOutcome::Completed);
        assert_eq!(pump.stats().snapshot().lease_renewals, 2);
        assert_eq!(bus.renewal_count(&path).await, 2);
    }

    #[tokio::test]
    async fn cancellation_abandons_in_flight_handler() {
        let (bus, path) = bus_with_subscription().await;
        let pump = pump(&bus, single(Slow(Duration::from_secs(60))), PumpOptions::default());
        let raw = leased(&bus, &path, message("E-1", "order.created")).await;
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let task = tokio::spawn({
            let pump = pump.clone();
            let path = path.clone();
            async move {
                pump.process_message(&path, raw, CancellationSignal::new(cancel_rx))
                    .await
            }
        });
        time::sleep(Duration::from_millis(20)).await;
        cancel_tx.send(true).unwrap();

        assert_eq!(task.await.unwrap(), MessageOutcome::abandoned(CANCELLED_AT_SHUTDOWN));
        assert_eq!(bus.abandoned_count(&path).await, 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let wait = Duration::from_secs(5);
        assert_eq!(receive_backoff(wait, 1), Duration::from_millis(200));
        assert_eq!(receive_backoff(wait, 2), Duration::from_millis(400));
        assert_eq!(receive_backoff(wait, 30), MAX_RECEIVE_BACKOFF);
    }
}
