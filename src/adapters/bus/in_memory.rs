//! In-memory message bus for tests and local runs.
//!
//! Models the parts of a peek-lock topic bus the jobs rely on:
//! - Topics fan out to every subscription that exists at publish time
//! - Received messages stay leased until completed, abandoned or dead-lettered
//! - Abandoned messages are redelivered with an incremented delivery count
//! - Every call is recorded for assertions
//!
//! # Example
//!
//! ```ignore
//! let bus = Arc::new(InMemoryBus::new());
//! bus.create_subscription("orders", "jobs").await?;
//! bus.publish_envelope("orders", &envelope).await;
//!
//! // ... run a pump ...
//! assert_eq!(bus.completed(&path).await.len(), 1);
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{self, Instant};

use crate::domain::envelope::{encode, Envelope, RawMessage};
use crate::domain::subscription::SubscriptionPath;
use crate::ports::{BusAdministration, BusError, BusReceiver};

#[derive(Debug, Default)]
struct SubscriptionState {
    pending: VecDeque<RawMessage>,
    leased: HashMap<String, RawMessage>,
    completed: Vec<RawMessage>,
    dead_lettered: Vec<(RawMessage, String)>,
    abandoned: usize,
    renewals: usize,
}

#[derive(Debug, Default)]
struct BusState {
    subscriptions: HashMap<SubscriptionPath, SubscriptionState>,
    created: Vec<SubscriptionPath>,
    deleted: Vec<SubscriptionPath>,
}

/// In-process topic bus implementing both bus ports.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    state: Mutex<BusState>,
    arrivals: Notify,
    receive_calls: AtomicUsize,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a copy of `message` to every current subscription of `topic`.
    ///
    /// Returns how many subscriptions received it.
    pub async fn publish(&self, topic: &str, message: RawMessage) -> usize {
        let mut state = self.state.lock().await;
        let mut delivered = 0;
        for (path, subscription) in state.subscriptions.iter_mut() {
            if path.topic == topic {
                subscription.pending.push_back(message.clone().with_delivery_count(1));
                delivered += 1;
            }
        }
        drop(state);
        self.arrivals.notify_waiters();
        delivered
    }

    /// Publishes an envelope in structured mode.
    pub async fn publish_envelope(&self, topic: &str, envelope: &Envelope) -> usize {
        self.publish(topic, encode(envelope)).await
    }

    // === Test Helpers ===

    /// Number of `receive` calls made against any subscription.
    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    /// Subscriptions created through the administration port, in order.
    pub async fn created_subscriptions(&self) -> Vec<SubscriptionPath> {
        self.state.lock().await.created.clone()
    }

    /// Subscriptions deleted through the administration port, in order.
    pub async fn deleted_subscriptions(&self) -> Vec<SubscriptionPath> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn completed(&self, path: &SubscriptionPath) -> Vec<RawMessage> {
        self.with_subscription(path, |s| s.completed.clone()).await
    }

    pub async fn dead_lettered(&self, path: &SubscriptionPath) -> Vec<(RawMessage, String)> {
        self.with_subscription(path, |s| s.dead_lettered.clone()).await
    }

    pub async fn abandoned_count(&self, path: &SubscriptionPath) -> usize {
        self.with_subscription(path, |s| s.abandoned).await
    }

    pub async fn renewal_count(&self, path: &SubscriptionPath) -> usize {
        self.with_subscription(path, |s| s.renewals).await
    }

    pub async fn pending_count(&self, path: &SubscriptionPath) -> usize {
        self.with_subscription(path, |s| s.pending.len()).await
    }

    pub async fn leased_count(&self, path: &SubscriptionPath) -> usize {
        self.with_subscription(path, |s| s.leased.len()).await
    }

    async fn with_subscription<R: Default>(
        &self,
        path: &SubscriptionPath,
        read: impl FnOnce(&SubscriptionState) -> R,
    ) -> R {
        self.state
            .lock()
            .await
            .subscriptions
            .get(path)
            .map(read)
            .unwrap_or_default()
    }

    async fn settle(
        &self,
        path: &SubscriptionPath,
        message: &RawMessage,
        apply: impl FnOnce(&mut SubscriptionState, RawMessage),
    ) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        let subscription = state
            .subscriptions
            .get_mut(path)
            .ok_or_else(|| not_found(path))?;
        let leased = subscription
            .leased
            .remove(&message.message_id)
            .ok_or_else(|| BusError::LeaseLost {
                message_id: message.message_id.clone(),
            })?;
        apply(subscription, leased);
        Ok(())
    }
}

fn not_found(path: &SubscriptionPath) -> BusError {
    BusError::NotFound {
        topic: path.topic.clone(),
        subscription: path.name.clone(),
    }
}

#[async_trait]
impl BusAdministration for InMemoryBus {
    async fn subscription_exists(&self, topic: &str, subscription: &str) -> Result<bool, BusError> {
        let path = SubscriptionPath::new(topic, subscription);
        Ok(self.state.lock().await.subscriptions.contains_key(&path))
    }

    async fn create_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError> {
        let path = SubscriptionPath::new(topic, subscription);
        let mut state = self.state.lock().await;
        if state.subscriptions.contains_key(&path) {
            return Err(BusError::AlreadyExists {
                topic: topic.to_string(),
                subscription: subscription.to_string(),
            });
        }
        state.subscriptions.insert(path.clone(), SubscriptionState::default());
        state.created.push(path);
        Ok(())
    }

    async fn delete_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError> {
        let path = SubscriptionPath::new(topic, subscription);
        let mut state = self.state.lock().await;
        if state.subscriptions.remove(&path).is_none() {
            return Err(not_found(&path));
        }
        state.deleted.push(path);
        Ok(())
    }

    async fn list_subscriptions(&self, topic: &str) -> Result<Vec<String>, BusError> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state
            .subscriptions
            .keys()
            .filter(|path| path.topic == topic)
            .map(|path| path.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl BusReceiver for InMemoryBus {
    async fn receive(
        &self,
        subscription: &SubscriptionPath,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<RawMessage>, BusError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + wait;
        loop {
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            // Register interest before checking so a publish in between is not missed.
            arrival.as_mut().enable();
            {
                let mut state = self.state.lock().await;
                let entry = state
                    .subscriptions
                    .get_mut(subscription)
                    .ok_or_else(|| not_found(subscription))?;
                if !entry.pending.is_empty() {
                    let take = max_batch.max(1).min(entry.pending.len());
                    let batch: Vec<RawMessage> = entry.pending.drain(..take).collect();
                    for message in &batch {
                        entry.leased.insert(message.message_id.clone(), message.clone());
                    }
                    return Ok(batch);
                }
            }
            if time::timeout_at(deadline, arrival).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn complete(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        self.settle(subscription, message, |s, m| s.completed.push(m)).await
    }

    async fn abandon(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        self.settle(subscription, message, |s, m| {
            s.abandoned += 1;
            let redelivery = m.delivery_count + 1;
            s.pending.push_back(m.with_delivery_count(redelivery));
        })
        .await?;
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn dead_letter(
        &self,
        subscription: &SubscriptionPath,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), BusError> {
        self.settle(subscription, message, |s, m| {
            s.dead_lettered.push((m, reason.to_string()))
        })
        .await
    }

    async fn renew_lease(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        let entry = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| not_found(subscription))?;
        if !entry.leased.contains_key(&message.message_id) {
            return Err(BusError::LeaseLost {
                message_id: message.message_id.clone(),
            });
        }
        entry.renewals += 1;
        Ok(())
    }
}
