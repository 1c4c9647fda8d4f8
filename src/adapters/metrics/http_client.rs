//! HTTP client for the jobs runs API.
//!
//! Lists completed runs with `GET {base}/api/2.1/jobs/runs/list`, following
//! `next_page_token` until the requested number of runs is collected. The
//! API serves at most 25 runs per page.
//!
//! The API filters on start time only, while a window asks for runs that
//! *finished* inside it. The query therefore reaches `lookback` further into
//! the past and runs are kept by their end time.
//!
//! # Configuration
//!
//! ```ignore
//! let options = MetricsJobOptions::new("https://adb-123.azuredatabricks.net", "databricks-token")?;
//! let client = build_client(&options, secrets.as_ref()).await?;
//! let runs = client.list_runs(window, options.max_runs()).await?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::foundation::JobError;
use crate::domain::metrics::{MetricsJobOptions, RunRecord, RunWindow};
use crate::ports::{MetricsApiClient, MetricsApiError, SecretProvider};

/// Largest page the runs API accepts.
pub const MAX_PAGE_SIZE: u32 = 25;

const RUNS_LIST_PATH: &str = "/api/2.1/jobs/runs/list";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long before a window a run may have started and still be reported.
pub const DEFAULT_RUN_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct RunsPage {
    #[serde(default)]
    runs: Vec<RunRecord>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct HttpMetricsClient {
    client: Client,
    base_url: String,
    token: Secret<String>,
    lookback: Duration,
}

impl HttpMetricsClient {
    pub fn new(base_url: impl Into<String>, token: Secret<String>) -> Result<Self, MetricsApiError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MetricsApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            lookback: DEFAULT_RUN_LOOKBACK,
        })
    }

    /// Longest run duration still picked up when it ends inside a window.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    fn runs_url(&self) -> String {
        format!("{}{}", self.base_url, RUNS_LIST_PATH)
    }

    async fn fetch_page(&self, window: RunWindow, page_token: Option<&str>) -> Result<RunsPage, MetricsApiError> {
        let mut query = page_query(window, self.lookback);
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let response = self
            .client
            .get(self.runs_url())
            .bearer_auth(self.token.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MetricsApiError::Transport(format!("timed out: {}", e))
                } else {
                    MetricsApiError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MetricsApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<RunsPage>()
            .await
            .map_err(|e| MetricsApiError::InvalidResponse(e.to_string()))
    }
}

/// Full pages over every run that started early enough to end in `window`.
fn page_query(window: RunWindow, lookback: Duration) -> Vec<(&'static str, String)> {
    let start_from = window.from().minus(lookback).as_unix_millis().max(0);
    vec![
        ("completed_only", "true".to_string()),
        ("start_time_from", start_from.to_string()),
        ("start_time_to", window.to().as_unix_millis().to_string()),
        ("limit", MAX_PAGE_SIZE.to_string()),
    ]
}

#[async_trait]
impl MetricsApiClient for HttpMetricsClient {
    async fn list_runs(&self, window: RunWindow, limit: u32) -> Result<Vec<RunRecord>, MetricsApiError> {
        let wanted = limit as usize;
        let mut runs = Vec::new();
        let mut page_token: Option<String> = None;

        while runs.len() < wanted {
            let page = self.fetch_page(window, page_token.as_deref()).await?;
            runs.extend(page.runs.into_iter().filter(|run| window.contains_end_of(run)));
            match page.next_page_token {
                Some(token) if page.has_more => page_token = Some(token),
                _ => break,
            }
        }

        runs.truncate(wanted);
        Ok(runs)
    }
}

/// Resolves the API token and builds the client.
///
/// Called once when the metrics job is configured; a missing token fails
/// host startup instead of the first tick.
pub async fn build_client(
    options: &MetricsJobOptions,
    secrets: &dyn SecretProvider,
) -> Result<HttpMetricsClient, JobError> {
    let token = secrets.get_secret(options.token_secret_key()).await.map_err(|e| {
        JobError::configuration(format!(
            "metrics API token '{}' could not be resolved: {}",
            options.token_secret_key(),
            e
        ))
    })?;
    HttpMetricsClient::new(options.base_url(), token).map_err(|e| JobError::configuration(e.to_string()))
}
