use crate::server::AdminState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use logkeeper_pipeline::PipelineState;
use serde_json::{Value, json};
use std::sync::Arc;

/// 200 while the pipeline is running, 503 once it is draining or stopped.
pub async fn health_check(State(state): State<Arc<AdminState>>) -> (StatusCode, Json<Value>) {
    let pipeline = state.signal.state();
    let code = match pipeline {
        PipelineState::Running => StatusCode::OK,
        PipelineState::Draining | PipelineState::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": pipeline.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
            "metrics_enabled": state.metrics.is_enabled(),
        })),
    )
}
