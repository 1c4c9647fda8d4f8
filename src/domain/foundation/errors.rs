//! Error types for the domain layer.
//!
//! Startup failures (`JobError`) are fatal and stop a job from being
//! registered. Per-message failures (`HandlerError`, `DecodeError` in the
//! envelope module) only ever decide how one message is settled.

use thiserror::Error;

/// Errors that occur while validating option values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be blank")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: u64,
        max: u64,
        actual: u64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: u64, max: u64, actual: u64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Returns `EmptyField` when `value` is empty or whitespace only.
pub fn require_non_blank(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(())
}

/// Fatal errors raised while starting a background job.
#[derive(Debug, Error)]
pub enum JobError {
    /// A required setting is missing or blank, or an explicitly named
    /// subscription does not exist.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A bus management call failed with something other than "already exists".
    #[error("administrative call failed for subscription '{subscription}' on topic '{topic}': {reason}")]
    Administrative {
        topic: String,
        subscription: String,
        reason: String,
    },

    /// The job stopped abnormally after it had started (worker task panicked).
    #[error("background job '{job}' stopped abnormally: {reason}")]
    Aborted { job: String, reason: String },
}

impl JobError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        JobError::Configuration(message.into())
    }

    /// Returns true for errors that must keep the host from reporting ready.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            JobError::Configuration(_) | JobError::Administrative { .. }
        )
    }
}

impl From<ValidationError> for JobError {
    fn from(err: ValidationError) -> Self {
        JobError::Configuration(err.to_string())
    }
}

/// Failure reported by a message handler.
///
/// The variant decides settlement: transient faults abandon the message so the
/// bus redelivers it, permanent faults dead-letter it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("transient fault: {0}")]
    Transient(String),

    #[error("permanent fault: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn transient(reason: impl Into<String>) -> Self {
        HandlerError::Transient(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        HandlerError::Permanent(reason.into())
    }

    /// Returns the reason without the fault-kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            HandlerError::Transient(reason) | HandlerError::Permanent(reason) => reason,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}
