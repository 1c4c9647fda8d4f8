//! Domain layer containing the pure types of the background jobs.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, error taxonomy)
//! - `envelope` - Cloud-event envelope, codec and typed payload decoding
//! - `subscription` - Subscription descriptors and naming
//! - `dispatch` - Per-message context and settlement outcomes
//! - `secrets` - Secret rotation notifications
//! - `metrics` - Remote job run records

pub mod dispatch;
pub mod envelope;
pub mod foundation;
pub mod metrics;
pub mod secrets;
pub mod subscription;
