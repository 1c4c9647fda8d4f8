//! MetricsApiClient port - lists finished runs of remote jobs.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::metrics::{RunRecord, RunWindow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsApiError {
    #[error("metrics API rejected credentials")]
    Unauthorized,

    #[error("metrics API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("metrics API request failed: {0}")]
    Transport(String),

    #[error("metrics API response could not be parsed: {0}")]
    InvalidResponse(String),
}

/// Port for the remote metrics API.
#[async_trait]
pub trait MetricsApiClient: Send + Sync {
    /// Lists runs whose end time falls inside `window`, at most `limit` of
    /// them, whenever they started.
    async fn list_runs(&self, window: RunWindow, limit: u32) -> Result<Vec<RunRecord>, MetricsApiError>;
}
