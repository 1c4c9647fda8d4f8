//! Secret invalidation job - drops cached secrets when they rotate.
//!
//! Listens for two notification shapes:
//! - `secret.changed` with `{"name": "..."}`
//! - `Microsoft.KeyVault.SecretNewVersionCreated` with `{"ObjectName": "..."}`
//!
//! A failed invalidation is a transient fault: the message is abandoned and
//! the redelivery retries it. Invalidation is idempotent, so duplicates are
//! harmless.

use async_trait::async_trait;
use std::sync::Arc;

use crate::application::routing::{HandlerRegistry, Registration};
use crate::domain::dispatch::JobRunContext;
use crate::domain::envelope::{AdditionalMembers, Payload};
use crate::domain::foundation::HandlerError;
use crate::domain::secrets::{
    SecretChanged, SecretNewVersionCreated, SecretNotification,
    KEY_VAULT_SECRET_NEW_VERSION_EVENT_TYPE, SECRET_CHANGED_EVENT_TYPE,
};
use crate::ports::{CacheInvalidationSink, MessageHandler};

pub struct SecretInvalidationHandler {
    sink: Arc<dyn CacheInvalidationSink>,
}

impl SecretInvalidationHandler {
    pub fn new(sink: Arc<dyn CacheInvalidationSink>) -> Self {
        Self { sink }
    }

    async fn invalidate(&self, notification: &impl SecretNotification, ctx: &JobRunContext) -> Result<(), HandlerError> {
        let name = notification.secret_name().trim();
        if name.is_empty() {
            return Err(HandlerError::permanent("secret name is blank"));
        }
        self.sink.invalidate(name).await.map_err(|e| {
            tracing::warn!(
                correlation_id = %ctx.correlation_id,
                secret = name,
                error = %e,
                "secret invalidation failed"
            );
            HandlerError::transient(e.to_string())
        })?;
        tracing::info!(
            correlation_id = %ctx.correlation_id,
            secret = name,
            "invalidated cached secret"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageHandler<SecretChanged> for SecretInvalidationHandler {
    async fn handle(&self, payload: SecretChanged, ctx: &JobRunContext) -> Result<(), HandlerError> {
        self.invalidate(&payload, ctx).await
    }

    fn name(&self) -> &'static str {
        "SecretInvalidation"
    }
}

#[async_trait]
impl MessageHandler<SecretNewVersionCreated> for SecretInvalidationHandler {
    async fn handle(&self, payload: SecretNewVersionCreated, ctx: &JobRunContext) -> Result<(), HandlerError> {
        self.invalidate(&payload, ctx).await
    }

    fn name(&self) -> &'static str {
        "KeyVaultSecretInvalidation"
    }
}

/// Registry with both notification shapes routed to `sink`.
pub fn secret_invalidation_registry(
    sink: Arc<dyn CacheInvalidationSink>,
    additional_members: AdditionalMembers,
) -> HandlerRegistry {
    let handler = Arc::new(SecretInvalidationHandler::new(sink));
    HandlerRegistry::new(additional_members)
        .register(typed::<SecretChanged>(handler.clone()).for_event_type(SECRET_CHANGED_EVENT_TYPE))
        .register(
            typed::<SecretNewVersionCreated>(handler)
                .for_event_type(KEY_VAULT_SECRET_NEW_VERSION_EVENT_TYPE),
        )
}

fn typed<T: Payload>(handler: Arc<SecretInvalidationHandler>) -> Registration<T>
where
    SecretInvalidationHandler: MessageHandler<T>,
{
    Registration::new(handler)
}
