//! # HTTP Server
//!
//! HTTP server for metrics, health checks, and manual sync triggers.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once the scheduler is running)
//! - `POST /trigger` - Request a pass now (202, coalesced with any pending request)
//! - `GET /report` - Last finished pass report (204 until the first pass finishes)
//!
//! The server runs on port 4000 by default (configurable via `METRICS_PORT`).

use crate::controller::scheduler::TriggerHandle;
use crate::observability::metrics::REGISTRY;
use crate::provider::sink::SharedReport;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Default)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
    /// Absent when running without a scheduler
    pub trigger: Option<TriggerHandle>,
    pub last_report: SharedReport,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/trigger", post(trigger_handler))
        .route("/report", get(report_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn trigger_handler(State(state): State<Arc<ServerState>>) -> Response {
    let Some(trigger) = &state.trigger else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "scheduler not running"})),
        )
            .into_response();
    };

    let queued = trigger.trigger();
    info!(coalesced = !queued, "Manual sync requested");
    (
        StatusCode::ACCEPTED,
        Json(json!({"accepted": true, "coalesced": !queued})),
    )
        .into_response()
}

async fn report_handler(State(state): State<Arc<ServerState>>) -> Response {
    match state.last_report.read().await.clone() {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
