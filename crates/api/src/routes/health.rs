//! Health and metrics routes

use std::sync::Arc;

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::dto::HealthResponse;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "Cheating Detection API",
        version: state.version.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        detector_backend: state.classifier.backend(),
        tracked_subjects: state.monitor.subject_count(),
        configuration: state.settings.summary(),
    })
}

/// `GET /metrics`: Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Metrics exporter not installed".to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
