use crate::handlers;
use axum::{Router, routing::get};
use logkeeper_core::config::AdminConfig;
use logkeeper_observability::PipelineMetrics;
use logkeeper_pipeline::ShutdownSignal;
use std::sync::Arc;
use tracing::info;

/// Shared state for the admin endpoint.
pub struct AdminState {
    pub metrics: Arc<PipelineMetrics>,
    pub signal: ShutdownSignal,
}

pub fn build_admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .with_state(state)
}

/// Serve the admin endpoint until the process exits.
pub async fn start_admin(config: AdminConfig, state: Arc<AdminState>) -> anyhow::Result<()> {
    let app = build_admin_router(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(addr = %config.addr, "Admin endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}
