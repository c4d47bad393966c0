//! Health check endpoint.
//!
//! - `GET /health` - Liveness probe. Always 200 while the process serves
//!   requests; reports whether a ramp currently holds the execution lock.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "ramp_running": state.service.is_busy(),
            "shutting_down": state.shutdown.is_cancelled(),
        })),
    )
}
