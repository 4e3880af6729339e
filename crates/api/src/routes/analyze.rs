//! Frame analysis routes

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use debounce::subject_key;
use tracing::{debug, info};

use crate::dto::{
    AnalyzeRequest, AnalyzeResponse, BatchFrameResult, BatchRequest, BatchResponse, SkippedFrame,
    SubjectId, TestDetectionResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::FrameOutcome;
use crate::AppState;

fn subject_of(id: Option<SubjectId>) -> String {
    subject_key(id.map(|id| id.as_string()).as_deref())
}

/// Reject missing or oversized frames before any state is touched
fn require_frame(state: &AppState, frame: Option<String>) -> ApiResult<String> {
    let frame = frame
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No frame provided".to_string()))?;
    check_frame_size(state, &frame)?;
    Ok(frame)
}

fn check_frame_size(state: &AppState, frame: &str) -> ApiResult<()> {
    if state.settings.frame_too_large(frame) {
        return Err(ApiError::PayloadTooLarge(format!(
            "Frame size exceeds {}MB limit",
            state.settings.max_frame_size_mb
        )));
    }
    Ok(())
}

/// `POST /analyze-frame`
pub async fn analyze_frame(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload?;
    let frame = require_frame(&state, request.frame)?;
    let subject = subject_of(request.student_id);

    let response = match state.process_frame(&subject, frame, request.force_process).await {
        FrameOutcome::Skipped => AnalyzeResponse::Skipped(SkippedFrame::default()),
        FrameOutcome::Analyzed(report) => AnalyzeResponse::Analyzed(report),
    };
    Ok(Json(response))
}

/// `POST /test-detection`: classification only, never saves
pub async fn test_detection(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<TestDetectionResponse>> {
    let Json(request) = payload?;
    let frame = require_frame(&state, request.frame)?;

    let analysis = state.classify(frame).await;
    debug!(reason = %analysis.verdict.reason, "Test detection");
    Ok(Json(TestDetectionResponse::new(analysis.verdict)))
}

/// `POST /batch-analyze`: frames go through the gate in order; the sampler is bypassed
pub async fn batch_analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> ApiResult<Json<BatchResponse>> {
    let Json(request) = payload?;
    let frames = request
        .frames
        .filter(|frames| !frames.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No frames provided".to_string()))?;

    if frames.len() > state.settings.max_batch_size {
        return Err(ApiError::PayloadTooLarge(format!(
            "Batch of {} frames exceeds limit of {}",
            frames.len(),
            state.settings.max_batch_size
        )));
    }
    for frame in &frames {
        check_frame_size(&state, frame)?;
    }

    let subject = subject_of(request.student_id);
    let total_frames = frames.len();
    info!(%subject, total_frames, "Batch analysis");

    let mut results = Vec::with_capacity(total_frames);
    for (frame_index, frame) in frames.into_iter().enumerate() {
        let analysis = state.classify(frame).await;
        let report = state.settle(&subject, analysis, Instant::now()).await;
        results.push(BatchFrameResult { frame_index, report });
    }

    Ok(Json(BatchResponse {
        total_frames,
        cheating_detected_count: results.iter().filter(|r| r.report.cheating_detected).count(),
        saved_count: results.iter().filter(|r| r.report.frame_saved).count(),
        results,
    }))
}
