//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps and the error taxonomy shared by the
//! codec, the registry and the pump.

mod errors;
mod ids;
mod timestamp;

pub use errors::{require_non_blank, HandlerError, JobError, ValidationError};
pub use ids::{short_unique_suffix, EventId};
pub use timestamp::Timestamp;
