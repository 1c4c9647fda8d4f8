//! Caching secret provider.
//!
//! Resolved values are kept in process until invalidated. The provider is
//! also the `CacheInvalidationSink` the secret invalidation job drives, so a
//! rotation event makes the next lookup go back to the underlying store.
//!
//! Every invalidation bumps a per-name generation. A lookup only caches what
//! it fetched if the generation is unchanged, so a fetch racing a rotation
//! never stores the pre-rotation value.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ports::{CacheInvalidationSink, InvalidationError, SecretError, SecretProvider};

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Secret<String>>,
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

pub struct CachedSecretProvider {
    inner: Arc<dyn SecretProvider>,
    cache: RwLock<CacheState>,
}

impl CachedSecretProvider {
    pub fn new(inner: Arc<dyn SecretProvider>) -> Self {
        Self {
            inner,
            cache: RwLock::new(CacheState::default()),
        }
    }

    pub async fn is_cached(&self, key: &str) -> bool {
        self.cache.read().await.entries.contains_key(key)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.entries.len()
    }
}

fn copy(secret: &Secret<String>) -> Secret<String> {
    Secret::new(secret.expose_secret().clone())
}

#[async_trait]
impl SecretProvider for CachedSecretProvider {
    async fn get_secret(&self, key: &str) -> Result<Secret<String>, SecretError> {
        let generation = {
            let state = self.cache.read().await;
            if let Some(cached) = state.entries.get(key) {
                return Ok(copy(cached));
            }
            state.generation(key)
        };

        let fetched = self.inner.get_secret(key).await?;

        let mut state = self.cache.write().await;
        if state.generation(key) == generation {
            state.entries.insert(key.to_string(), copy(&fetched));
            tracing::debug!(secret = %key, "secret cached");
        } else {
            tracing::debug!(secret = %key, "secret invalidated during lookup, not cached");
        }
        Ok(fetched)
    }
}

#[async_trait]
impl CacheInvalidationSink for CachedSecretProvider {
    async fn invalidate(&self, secret_name: &str) -> Result<(), InvalidationError> {
        let mut state = self.cache.write().await;
        *state.generations.entry(secret_name.to_string()).or_insert(0) += 1;
        let removed = state.entries.remove(secret_name).is_some();
        tracing::info!(secret = %secret_name, was_cached = removed, "secret cache entry invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySecretProvider;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Store that reads its value, then waits for `release` before returning.
    struct GatedStore {
        value: Mutex<String>,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new(value: &str) -> Self {
            Self {
                value: Mutex::new(value.to_string()),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }

        fn set(&self, value: &str) {
            *self.value.lock().unwrap() = value.to_string();
        }
    }

    #[async_trait]
    impl SecretProvider for GatedStore {
        async fn get_secret(&self, _key: &str) -> Result<Secret<String>, SecretError> {
            let value = self.value.lock().unwrap().clone();
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Secret::new(value))
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let store = Arc::new(InMemorySecretProvider::new().with_secret("db-password", "v1"));
        let cached = CachedSecretProvider::new(store.clone());

        cached.get_secret("db-password").await.unwrap();
        let value = cached.get_secret("db-password").await.unwrap();

        assert_eq!(value.expose_secret(), "v1");
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch_of_rotated_value() {
        let store = Arc::new(InMemorySecretProvider::new().with_secret("db-password", "v1"));
        let cached = CachedSecretProvider::new(store.clone());
        cached.get_secret("db-password").await.unwrap();

        store.set("db-password", "v2");
        cached.invalidate("db-password").await.unwrap();
        let value = cached.get_secret("db-password").await.unwrap();

        assert_eq!(value.expose_secret(), "v2");
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn invalidation_during_lookup_keeps_stale_value_out_of_cache() {
        let store = Arc::new(GatedStore::new("v1"));
        let cached = Arc::new(CachedSecretProvider::new(store.clone()));

        let lookup = tokio::spawn({
            let cached = cached.clone();
            async move { cached.get_secret("db").await }
        });
        store.entered.notified().await;
        store.set("v2");
        cached.invalidate("db").await.unwrap();
        store.release.notify_one();

        let in_flight = lookup.await.unwrap().unwrap();
        assert_eq!(in_flight.expose_secret(), "v1");
        assert!(!cached.is_cached("db").await);

        let next = tokio::spawn({
            let cached = cached.clone();
            async move { cached.get_secret("db").await }
        });
        store.entered.notified().await;
        store.release.notify_one();
        assert_eq!(next.await.unwrap().unwrap().expose_secret(), "v2");
        assert!(cached.is_cached("db").await);
    }

    #[tokio::test]
    async fn invalidating_unknown_name_is_a_no_op() {
        let cached = CachedSecretProvider::new(Arc::new(InMemorySecretProvider::new()));

        assert!(cached.invalidate("never-cached").await.is_ok());
        assert!(cached.invalidate("never-cached").await.is_ok());
        assert_eq!(cached.cached_count().await, 0);
    }

    #[tokio::test]
    async fn missing_secret_is_not_cached() {
        let cached = CachedSecretProvider::new(Arc::new(InMemorySecretProvider::new()));

        let err = cached.get_secret("absent").await.unwrap_err();

        assert!(matches!(err, SecretError::NotFound(_)));
        assert!(!cached.is_cached("absent").await);
    }
}
