//! Secret provider adapters.
//!
//! - `EnvSecretProvider` - process environment
//! - `InMemorySecretProvider` - map-backed store for tests
//! - `CachedSecretProvider` - in-process cache, also the invalidation sink

mod cached;
mod env;
mod in_memory;

pub use cached::CachedSecretProvider;
pub use env::{EnvSecretProvider, DEFAULT_SECRET_ENV_PREFIX};
pub use in_memory::InMemorySecretProvider;
