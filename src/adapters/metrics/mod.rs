//! Metrics API adapters.

mod http_client;

pub use http_client::{build_client, HttpMetricsClient, DEFAULT_RUN_LOOKBACK, MAX_PAGE_SIZE};
