//! Dispatch module - per-message context and settlement outcomes.

mod context;
mod outcome;

pub use context::{CancellationSignal, JobRunContext, OPERATION_ID_PROPERTY};
pub use outcome::{
    MessageOutcome, UnmatchedPolicy, CANCELLED_AT_SHUTDOWN, MALFORMED_ENVELOPE, UNROUTABLE,
};
