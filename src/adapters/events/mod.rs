//! Event publisher adapters.
//!
//! - `InMemoryEventPublisher` - captures envelopes for assertions
//! - `LoggingEventPublisher` - writes envelopes to the structured log
//!
//! The Redis stream publisher lives with the Redis bus in `adapters::bus`.

mod in_memory;
mod logging;

pub use in_memory::InMemoryEventPublisher;
pub use logging::LoggingEventPublisher;
