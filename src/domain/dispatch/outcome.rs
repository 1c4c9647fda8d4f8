//! Terminal outcome of one inbound message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason attached to messages whose envelope cannot be decoded.
pub const MALFORMED_ENVELOPE: &str = "malformed envelope";

/// Reason attached to messages no registration accepts.
pub const UNROUTABLE: &str = "unroutable";

/// Reason attached to messages whose handler was cancelled at shutdown.
pub const CANCELLED_AT_SHUTDOWN: &str = "cancelled at shutdown";

/// How a message was settled with the bus.
///
/// `Abandoned` and `DeadLettered` carry the reason that gets logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Completed,
    Abandoned(String),
    DeadLettered(String),
}

impl MessageOutcome {
    pub fn abandoned(reason: impl Into<String>) -> Self {
        MessageOutcome::Abandoned(reason.into())
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MessageOutcome::Completed => None,
            MessageOutcome::Abandoned(reason) | MessageOutcome::DeadLettered(reason) => Some(reason.as_str()),
        }
    }

    pub fn dead_lettered(reason: impl Into<String>) -> Self {
        MessageOutcome::DeadLettered(reason.into())
    }
}

impl fmt::Display for MessageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageOutcome::Completed => write!(f, "completed"),
            MessageOutcome::Abandoned(reason) => write!(f, "abandoned ({})", reason),
            MessageOutcome::DeadLettered(reason) => write!(f, "dead-lettered ({})", reason),
        }
    }
}

/// What to do with a message no registration accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Dead-letter with reason `unroutable`.
    #[default]
    DeadLetter,
    /// Complete the message without side effects.
    Complete,
}

impl UnmatchedPolicy {
    pub fn outcome(self) -> MessageOutcome {
        match self {
            UnmatchedPolicy::DeadLetter => MessageOutcome::dead_lettered(UNROUTABLE),
            UnmatchedPolicy::Complete => MessageOutcome::Completed,
        }
    }
}

impl std::str::FromStr for UnmatchedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dead_letter" | "deadletter" | "dead-letter" => Ok(UnmatchedPolicy::DeadLetter),
            "complete" | "ignore" => Ok(UnmatchedPolicy::Complete),
            other => Err(format!("expected 'dead_letter' or 'complete', got '{}'", other)),
        }
    }
}
