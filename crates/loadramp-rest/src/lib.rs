//! REST API for loadramp.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness, including whether a ramp is running
//! - `POST /api/v1/runs` - Execute a ramp and store its reports
//! - `GET /api/v1/runs` - List stored runs
//! - `GET /api/v1/runs/:name` - Stored reports with density and cumulative curves
//! - `GET /api/v1/runs/:name/download` - Stored run as written
//! - `DELETE /api/v1/cache` - Drop every cached run view
//! - `DELETE /api/v1/cache/:name` - Drop the cached view of one run

pub mod handlers;
pub mod tracing_init;

use axum::{
    routing::{delete, get, post},
    Router,
};
use loadramp_service::{CancellationToken, RampService};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
pub struct AppState {
    pub service: Arc<RampService>,
    /// Root cancellation token; cancelled on shutdown to interrupt running ramps.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: Arc<RampService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/v1/runs",
            post(handlers::create_run).get(handlers::list_runs),
        )
        .route("/api/v1/runs/:name", get(handlers::get_run))
        .route("/api/v1/runs/:name/download", get(handlers::download_run))
        .route("/api/v1/cache", delete(handlers::flush_cache))
        .route("/api/v1/cache/:name", delete(handlers::flush_cached_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
