//! Integration tests for the admin endpoint.
//!
//! Uses `tower::ServiceExt::oneshot` to call handlers without binding a real
//! TCP port.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use logkeeper_admin::{AdminState, build_admin_router};
use logkeeper_observability::PipelineMetrics;
use logkeeper_pipeline::ShutdownCoordinator;
use std::sync::Arc;
use tower::ServiceExt; // .oneshot()

// ── Helper ────────────────────────────────────────────────────

fn make_state(coordinator: &ShutdownCoordinator, metrics: PipelineMetrics) -> Arc<AdminState> {
    Arc::new(AdminState {
        metrics: Arc::new(metrics),
        signal: coordinator.signal(),
    })
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ── Health ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok_while_running() {
    let coordinator = ShutdownCoordinator::new();
    let app = build_admin_router(make_state(&coordinator, PipelineMetrics::disabled()));

    let resp = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["metrics_enabled"], false);
}

#[tokio::test]
async fn health_is_unavailable_while_draining() {
    let coordinator = ShutdownCoordinator::new();
    let app = build_admin_router(make_state(&coordinator, PipelineMetrics::disabled()));
    coordinator.shutdown();

    let resp = app.oneshot(get_req("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["status"], "draining");
}

// ── Metrics ───────────────────────────────────────────────────

#[tokio::test]
async fn metrics_renders_prometheus_text() {
    let coordinator = ShutdownCoordinator::new();
    let metrics = PipelineMetrics::new(true).unwrap();
    metrics.record_consumed();
    metrics.record_indexed("gateway", 200, 0.01);
    let app = build_admin_router(make_state(&coordinator, metrics));

    let resp = app.oneshot(get_req("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = body_text(resp).await;
    assert!(text.contains("logkeeper_messages_consumed_total 1"));
    assert!(text.contains(r#"logkeeper_documents_indexed_total{service="gateway",status="200"} 1"#));
}

#[tokio::test]
async fn metrics_is_not_found_when_disabled() {
    let coordinator = ShutdownCoordinator::new();
    let app = build_admin_router(make_state(&coordinator, PipelineMetrics::disabled()));

    let resp = app.oneshot(get_req("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let coordinator = ShutdownCoordinator::new();
    let app = build_admin_router(make_state(&coordinator, PipelineMetrics::disabled()));

    let resp = app.oneshot(get_req("/routes")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
