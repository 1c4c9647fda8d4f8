//! In-memory secret store for tests and local runs.

use async_trait::async_trait;
use secrecy::Secret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::ports::{SecretError, SecretProvider};

/// Secret store backed by a map; counts lookups so caching can be asserted.
#[derive(Debug, Default)]
pub struct InMemorySecretProvider {
    values: RwLock<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl InMemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Stores or rotates a value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into(), value.into());
    }

    // === Test Helpers ===

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretProvider for InMemorySecretProvider {
    async fn get_secret(&self, key: &str) -> Result<Secret<String>, SecretError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .map(|value| Secret::new(value.clone()))
            .ok_or_else(|| SecretError::NotFound(key.to_string()))
    }
}
