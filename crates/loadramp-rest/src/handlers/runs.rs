use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use loadramp_core::{LoadSummary, RampPlan, RequestTemplate, RunResult, Sequence};
use loadramp_service::ServiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

type ApiError = (StatusCode, String);

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    name: String,
    url: String,
    #[serde(default)]
    method: Option<String>,
    /// `Name: value` lines
    #[serde(default)]
    headers: String,
    #[serde(default)]
    body: String,
    min: i64,
    max: i64,
    step: i64,
    #[serde(default)]
    step_timeout_secs: f64,
    #[serde(default)]
    step_delay_secs: f64,
    /// Deadline for the whole ramp; 0 disables it
    #[serde(default)]
    deadline_secs: f64,
}

impl CreateRunRequest {
    fn into_plan(self) -> Result<RampPlan, ApiError> {
        if self.name.trim().is_empty() {
            return Err((StatusCode::BAD_REQUEST, "name cannot be empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err((StatusCode::BAD_REQUEST, "url cannot be empty".to_string()));
        }

        let request = RequestTemplate::new(self.method.unwrap_or_default(), self.url)
            .with_header_block(&self.headers)
            .with_body(self.body);

        Ok(RampPlan::builder(self.name, request)
            .concurrency(self.min, self.max)
            .step(self.step)
            .step_timeout(seconds("step_timeout_secs", self.step_timeout_secs)?)
            .step_delay(seconds("step_delay_secs", self.step_delay_secs)?)
            .deadline(seconds("deadline_secs", self.deadline_secs)?)
            .build())
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ApiError> {
    Duration::try_from_secs_f64(value).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid {}: {} ({})", field, value, e),
        )
    })
}

fn service_error(e: ServiceError) -> ApiError {
    let status = if e.is_configuration() {
        StatusCode::BAD_REQUEST
    } else if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, e.to_string())
}

#[derive(Debug, Serialize)]
pub struct StepView {
    concurrency: i64,
    url: String,
    summary: LoadSummary,
    density: Sequence,
    cumulative: Sequence,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    name: String,
    steps: Vec<StepView>,
}

impl RunResponse {
    fn new(name: String, result: &RunResult) -> Self {
        let steps = result
            .iter()
            .map(|report| StepView {
                concurrency: report.concurrency,
                url: report.url.clone(),
                summary: report.summary.clone(),
                density: report.density_sequence().clone(),
                cumulative: report.cumulative_sequence().clone(),
            })
            .collect();
        Self { name, steps }
    }
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    runs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FlushResponse {
    flushed: usize,
}

/// Execute a ramp and return its reports.
///
/// The ramp runs in its own task so a disconnecting client does not abort
/// it; it waits for any ramp already running.
#[tracing::instrument(skip(state, req), fields(name = %req.name, url = %req.url))]
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    let plan = req.into_plan()?;

    let service = Arc::clone(&state.service);
    let cancel = state.shutdown.clone();
    let name = plan.name().to_string();
    let result = tokio::spawn(async move { service.execute(&plan, &cancel).await })
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(RunResponse::new(name, &result))))
}

pub async fn list_runs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListRunsResponse>, ApiError> {
    let runs = state.service.list_runs().await.map_err(service_error)?;
    Ok(Json(ListRunsResponse { runs }))
}

pub async fn get_run(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunResponse>, ApiError> {
    let result = state.service.load_run(&name).await.map_err(service_error)?;
    Ok(Json(RunResponse::new(name, &result)))
}

/// Drop every cached run view.
pub async fn flush_cache(State(state): State<Arc<AppState>>) -> Json<FlushResponse> {
    let flushed = state.service.flush_views();
    tracing::info!(flushed, "run view cache flushed");
    Json(FlushResponse { flushed })
}

/// Drop the cached view of one run.
pub async fn flush_cached_run(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<FlushResponse> {
    let flushed = usize::from(state.service.flush_view(&name));
    Json(FlushResponse { flushed })
}

pub async fn download_run(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let raw: Bytes = state.service.load_raw(&name).await.map_err(service_error)?;
    let disposition = format!("attachment; filename=\"{}.json\"", name);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        raw,
    ))
}
