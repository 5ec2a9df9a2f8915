//! # HTTP API
//!
//! Builds the axum router that exposes the node's health, status, and
//! Prometheus metrics. Real block/transaction/account surfaces are owned
//! by the VM collaborator embedding this engine, not by this crate.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                                   |
//! |--------|------------|------------------------------------------------|
//! | GET    | `/health`  | Liveness probe; 503 if the engine is unhealthy |
//! | GET    | `/status`  | Engine lifecycle state and progress snapshot   |
//! | GET    | `/metrics` | Prometheus exposition                          |

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, SharedMetrics};
use crate::runtime::Runtime;

/// Shared application state available to all request handlers. Cheap to
/// clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The consensus runtime, queried (never driven) by request handlers.
    pub runtime: Arc<Runtime>,
    /// Reference to Prometheus metrics for the `/metrics` handler.
    pub metrics: SharedMetrics,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Build the application router with all routes and middleware attached.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
    state: String,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let engine = state.runtime.engine_handle();
    let report = engine.lock().await.health_check();
    let body = HealthResponse {
        healthy: report.is_healthy(),
        state: format!("{:?}", report.state),
    };
    let status = if body.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: String,
    state: String,
    bootstrapped: bool,
    last_accepted: Option<String>,
    stalled_count: usize,
    time_since_progress_secs: Option<f64>,
}

async fn status_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
    let engine = state.runtime.engine_handle();
    let report = engine.lock().await.health_check();
    Json(StatusResponse {
        version: state.version.clone(),
        state: format!("{:?}", report.state),
        bootstrapped: report.bootstrapped,
        last_accepted: report.last_accepted.map(|id| id.to_hex()),
        stalled_count: report.stalled.len(),
        time_since_progress_secs: report.time_since_progress.map(|d| d.as_secs_f64()),
    })
}
