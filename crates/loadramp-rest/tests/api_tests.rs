//! REST API tests driven through the router with `oneshot`.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use loadramp_core::RequestTemplate;
use loadramp_rest::{router, AppState};
use loadramp_service::{CancellationToken, LoadDriver, RampService};
use loadramp_storage::{LocalRunStore, MemoryRunStore, RunStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Two responses per step: one in each half of a 10ms..20ms histogram.
struct CannedDriver;

#[async_trait]
impl LoadDriver for CannedDriver {
    async fn run(&self, _: &RequestTemplate, concurrency: usize, _: CancellationToken) -> Bytes {
        let summary = json!({
            "total_secs": 1.0,
            "success_count": 2,
            "status_codes": { "200": 2 },
            "histogram": [
                { "mark_secs": 0.01, "count": 1, "frequency": 0.5 },
                { "mark_secs": 0.02, "count": 1, "frequency": 0.5 }
            ],
            "rps": concurrency as f64
        });
        Bytes::from(summary.to_string())
    }
}

fn app_with(store: Arc<dyn RunStore>, shutdown: CancellationToken) -> Router {
    let service = Arc::new(RampService::new(Arc::new(CannedDriver), store));
    router(Arc::new(AppState::new(service, shutdown)))
}

fn app() -> Router {
    app_with(Arc::new(MemoryRunStore::new()), CancellationToken::new())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn post_run(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/runs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn step_count(app: &Router, name: &str) -> usize {
    let (status, body) = send(app, get(&format!("/api/v1/runs/{}", name))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    body["steps"].as_array().unwrap().len()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ramp_running"], false);
}

#[tokio::test]
async fn test_create_run_returns_reports_with_sequences() {
    let app = app();
    let (status, body) = send(
        &app,
        post_run(json!({
            "name": "smoke",
            "url": "http://target.local/",
            "min": 1, "max": 4, "step": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["name"], "smoke");
    let steps = body["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[2]["concurrency"], 3);
    assert_eq!(steps[0]["url"], "http://target.local/");
    assert_eq!(steps[0]["density"][1]["value"], 0.5);
    assert_eq!(steps[0]["cumulative"][1]["value"], 1.0);
    assert_eq!(steps[0]["cumulative"][1]["latency_secs"], 0.02);
}

#[tokio::test]
async fn test_created_run_is_listed_and_loaded() {
    let app = app();
    for name in ["beta", "alpha"] {
        let (status, _) = send(
            &app,
            post_run(json!({ "name": name, "url": "http://t/", "min": 1, "max": 3, "step": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/v1/runs")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["runs"], json!(["alpha", "beta"]));

    let (status, body) = send(&app, get("/api/v1/runs/alpha")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_download_returns_stored_json() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(LocalRunStore::new(temp_dir.path()).await.unwrap());
    let app = app_with(store, CancellationToken::new());

    send(
        &app,
        post_run(json!({ "name": "nightly", "url": "http://t/", "min": 2, "max": 6, "step": 2 })),
    )
    .await;

    let response = app
        .clone()
        .oneshot(get("/api/v1/runs/nightly/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"nightly.json\""
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let on_disk = std::fs::read(temp_dir.path().join("nightly.json")).unwrap();
    assert_eq!(body.as_ref(), on_disk.as_slice());
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let app = app();
    let (status, _) = send(&app, get("/api/v1/runs/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/v1/runs/missing/download")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_step_is_bad_request() {
    let (status, body) = send(
        &app(),
        post_run(json!({ "name": "bad", "url": "http://t/", "min": 1, "max": 5, "step": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("step must be > 0"));
}

#[tokio::test]
async fn test_shutdown_cancels_new_runs() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let app = app_with(Arc::new(MemoryRunStore::new()), shutdown);

    let (status, body) = send(
        &app,
        post_run(json!({ "name": "late", "url": "http://t/", "min": 1, "max": 5, "step": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8_lossy(&body).contains("run cancelled"));

    let (_, body) = send(&app, get("/health")).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["shutting_down"], true);
}

#[tokio::test]
async fn test_unstorable_name_is_bad_request() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(LocalRunStore::new(temp_dir.path()).await.unwrap());
    let app = app_with(store, CancellationToken::new());

    let (status, body) = send(
        &app,
        post_run(json!({ "name": "team/smoke", "url": "http://t/", "min": 1, "max": 10, "step": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&body).contains("team/smoke"));

    let (_, body) = send(&app, get("/api/v1/runs")).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["runs"], json!([]));
}

#[tokio::test]
async fn test_huge_step_timeout_runs_normally() {
    let (status, body) = send(
        &app(),
        post_run(json!({
            "name": "far-timeout", "url": "http://t/", "min": 1, "max": 3, "step": 1,
            "step_timeout_secs": 1e19
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_huge_deadline_runs_normally() {
    let (status, body) = send(
        &app(),
        post_run(json!({
            "name": "far-deadline", "url": "http://t/", "min": 1, "max": 3, "step": 1,
            "deadline_secs": 1e19
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_run_views_are_cached_until_flushed() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(LocalRunStore::new(temp_dir.path()).await.unwrap());
    let app = app_with(store, CancellationToken::new());

    send(
        &app,
        post_run(json!({ "name": "cached", "url": "http://t/", "min": 1, "max": 3, "step": 1 })),
    )
    .await;
    assert_eq!(step_count(&app, "cached").await, 2);

    // Rewritten on disk behind the server's back
    std::fs::write(temp_dir.path().join("cached.json"), "[]").unwrap();
    assert_eq!(step_count(&app, "cached").await, 2);

    let (status, body) = send(&app, delete("/api/v1/cache/cached")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["flushed"], 1);
    assert_eq!(step_count(&app, "cached").await, 0);

    let (_, body) = send(&app, delete("/api/v1/cache/unknown")).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["flushed"], 0);
}

#[tokio::test]
async fn test_flush_all_run_views() {
    let app = app();
    for name in ["one", "two"] {
        send(
            &app,
            post_run(json!({ "name": name, "url": "http://t/", "min": 1, "max": 2, "step": 1 })),
        )
        .await;
        step_count(&app, name).await;
    }

    let (status, body) = send(&app, delete("/api/v1/cache")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["flushed"], 2);

    let (_, body) = send(&app, delete("/api/v1/cache")).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["flushed"], 0);
}
