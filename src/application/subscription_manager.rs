//! SubscriptionManager - provisions or adopts a job's subscription at startup.
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | `Automatic` | create `prefix-suffix` if absent; "already exists" is success |
//! | `GivenName` | must exist; never created |
//! | `None` | nothing is touched; the handle is inert |
//!
//! Subscriptions are never deleted here. Administrative failures surface as
//! `JobError::Administrative` and are not retried.

use std::sync::Arc;

use crate::domain::foundation::JobError;
use crate::domain::subscription::{SubscriptionDescriptor, SubscriptionMode, SubscriptionPath};
use crate::ports::{BusAdministration, BusError};

/// Handle to the subscription a job consumes.
///
/// An inert handle (mode `None`) carries no path and is never polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    path: Option<SubscriptionPath>,
    mode: SubscriptionMode,
}

impl ActiveSubscription {
    /// Handle for a job that consumes nothing.
    pub fn inert() -> Self {
        Self {
            path: None,
            mode: SubscriptionMode::None,
        }
    }

    pub fn path(&self) -> Option<&SubscriptionPath> {
        self.path.as_ref()
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    pub fn is_inert(&self) -> bool {
        self.path.is_none()
    }

    /// Gives the handle up. The subscription itself stays on the bus.
    pub fn release(self) {
        match &self.path {
            Some(path) => tracing::info!(subscription = %path, "released subscription handle"),
            None => tracing::debug!("released inert subscription handle"),
        }
    }
}

pub struct SubscriptionManager {
    admin: Arc<dyn BusAdministration>,
}

impl SubscriptionManager {
    pub fn new(admin: Arc<dyn BusAdministration>) -> Self {
        Self { admin }
    }

    /// Makes sure the described subscription can be consumed.
    ///
    /// Idempotent: ensuring the same `Automatic` descriptor twice succeeds
    /// and targets the same subscription.
    pub async fn ensure_subscription(
        &self,
        descriptor: &SubscriptionDescriptor,
    ) -> Result<ActiveSubscription, JobError> {
        let Some(path) = descriptor.path() else {
            tracing::info!(
                topic = descriptor.topic(),
                "subscription mode is none, job will not consume messages"
            );
            return Ok(ActiveSubscription::inert());
        };

        match descriptor.mode() {
            SubscriptionMode::GivenName => self.adopt(&path).await?,
            SubscriptionMode::Automatic => self.create_if_absent(&path).await?,
            SubscriptionMode::None => return Ok(ActiveSubscription::inert()),
        }

        Ok(ActiveSubscription {
            path: Some(path),
            mode: descriptor.mode(),
        })
    }

    async fn adopt(&self, path: &SubscriptionPath) -> Result<(), JobError> {
        let exists = self
            .admin
            .subscription_exists(&path.topic, &path.name)
            .await
            .map_err(|e| administrative(path, e))?;
        if !exists {
            return Err(JobError::configuration(format!(
                "subscription '{}' does not exist on topic '{}'",
                path.name, path.topic
            )));
        }
        tracing::info!(subscription = %path, "using existing subscription");
        Ok(())
    }

    async fn create_if_absent(&self, path: &SubscriptionPath) -> Result<(), JobError> {
        let exists = self
            .admin
            .subscription_exists(&path.topic, &path.name)
            .await
            .map_err(|e| administrative(path, e))?;
        if exists {
            tracing::debug!(subscription = %path, "subscription already present");
            return Ok(());
        }

        match self.admin.create_subscription(&path.topic, &path.name).await {
            Ok(()) => {
                tracing::info!(subscription = %path, "created subscription");
                Ok(())
            }
            Err(BusError::AlreadyExists { .. }) => {
                tracing::debug!(subscription = %path, "subscription created concurrently");
                Ok(())
            }
            Err(e) => Err(administrative(path, e)),
        }
    }
}

fn administrative(path: &SubscriptionPath, err: BusError) -> JobError {
    tracing::error!(subscription = %path, error = %err, "subscription administration failed");
    JobError::Administrative {
        topic: path.topic.clone(),
        subscription: path.name.clone(),
        reason: err.to_string(),
    }
}
