//! HTTP surface for the screenshot orchestrator
//!
//! One screenshot route plus health and metrics endpoints. Every failure
//! funnels through a single conversion boundary (`IntoResponse` for
//! `ServiceError`) which logs the typed kind and message before shaping
//! the response; no handler emits a partial response.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::{format_duration, metrics, ScreenshotService, ServiceError};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScreenshotService>,
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the service router (shared between startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(screenshot_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn screenshot_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("screenshot_request", %request_id);

    async move {
        let started = Instant::now();

        let Some(raw_url) = params.get("url") else {
            metrics::record_request(started.elapsed(), false);
            return ServiceError::MissingParameter.into_response();
        };

        match state.service.fetch(raw_url).await {
            Ok(outcome) => {
                metrics::record_request(started.elapsed(), true);
                info!(
                    size = outcome.bytes.len(),
                    source = ?outcome.source,
                    elapsed = %format_duration(started.elapsed()),
                    "returning screenshot"
                );
                (
                    StatusCode::OK,
                    [
                        ("content-type", "image/jpeg"),
                        ("x-browser-worker", "success"),
                    ],
                    outcome.bytes,
                )
                    .into_response()
            }
            Err(err) => {
                metrics::record_request(started.elapsed(), false);
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// The one place failures become HTTP responses.
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        error!(
            kind = self.kind(),
            severity = ?self.severity(),
            error = %self,
            detail = ?self,
            "request failed"
        );
        metrics::record_error(self.kind());

        match &self {
            ServiceError::MissingParameter => (
                StatusCode::BAD_REQUEST,
                [("x-browser-worker", "error-no-url")],
                "Please add an ?url=https://example.com/ parameter",
            )
                .into_response(),
            ServiceError::InvalidUrl(_) => {
                // Display already carries the `Invalid URL:` prefix.
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            ServiceError::WorkerCrashed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("x-error-code", "1042"), ("content-type", "text/plain")],
                format!("Browser worker crashed: {msg}"),
            )
                .into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Browser worker error: {self}"),
            )
                .into_response(),
        }
    }
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": format_duration(state.started_at.elapsed()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("Failed to create SIGINT handler");
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("Failed to create SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
    }
}
