//! Health endpoints of the job host.
//!
//! - `GET /health/live` - 200 while the process serves requests
//! - `GET /health/ready` - 200 once every configured job started, 503 before
//!   that and again after shutdown began; the body carries pump counters

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::application::{PumpStats, PumpStatsSnapshot};

/// Shared readiness flag and per-job counters.
#[derive(Clone, Default)]
pub struct HealthState {
    ready: Arc<AtomicBool>,
    jobs: Arc<RwLock<BTreeMap<String, Arc<PumpStats>>>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_job(&self, name: impl Into<String>, stats: Arc<PumpStats>) {
        self.jobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), stats);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn snapshots(&self) -> BTreeMap<String, PumpStatsSnapshot> {
        self.jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub jobs: BTreeMap<String, PumpStatsSnapshot>,
}

async fn live() -> StatusCode {
    StatusCode::OK
}

async fn ready(State(state): State<HealthState>) -> (StatusCode, Json<ReadinessResponse>) {
    let (status, label) = if state.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (
        status,
        Json(ReadinessResponse {
            status: label,
            jobs: state.snapshots(),
        }),
    )
}

/// Create the health router.
///
/// # Routes
/// - `GET /health/live`
/// - `GET /health/ready`
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
