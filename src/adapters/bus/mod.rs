//! Message bus adapters.
//!
//! - `InMemoryBus` - in-process topic bus for tests and local runs
//! - `RedisStreamsBus` - streams as topics, consumer groups as subscriptions
//! - `RedisStreamPublisher` - envelope publisher onto a stream

mod in_memory;
mod redis_streams;

pub use in_memory::InMemoryBus;
pub use redis_streams::{connect, RedisStreamPublisher, RedisStreamsBus, DEFAULT_CLAIM_IDLE};
