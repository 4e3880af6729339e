//! Captured artifact routes

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use debounce::subject_key;
use storage::StorageError;
use tracing::{debug, warn};

use crate::dto::{CheckStudentRequest, CheckStudentResponse};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Run a blocking store call off the async runtime
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, StorageError> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("storage task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// `POST /check-student`
pub async fn check_student(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckStudentRequest>, JsonRejection>,
) -> ApiResult<Json<CheckStudentResponse>> {
    let Json(request) = payload?;
    let student_id = request
        .student_id
        .map(|id| id.as_string())
        .filter(|id| !id.trim().is_empty())
        .map(|id| subject_key(Some(id.as_str())))
        .ok_or_else(|| ApiError::BadRequest("No student_id provided".to_string()))?;

    let subject = student_id.clone();
    let frames = blocking(&state, move |state| state.artifacts.list(&subject)).await?;
    debug!(%student_id, count = frames.len(), "Listed captured frames");

    Ok(Json(CheckStudentResponse {
        student_id,
        suspicious_activity_count: frames.len(),
        frames,
    }))
}

/// `GET /get-frame/:student_id/:frame_name`
pub async fn get_frame(
    State(state): State<Arc<AppState>>,
    Path((student_id, frame_name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let (subject, name) = (subject_key(Some(student_id.as_str())), frame_name.clone());
    let bytes = blocking(&state, move |state| state.artifacts.read(&subject, &name))
        .await
        .map_err(|e| {
            if matches!(e, ApiError::Forbidden) {
                warn!(%student_id, %frame_name, "Rejected frame path outside artifact root");
            }
            e
        })?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn capture_one(state: &std::sync::Arc<crate::AppState>, student: &str) -> String {
        let request = json!({"frame": frame_payload(TWO_FACES), "student_id": student});
        post_json(app(state), "/analyze-frame", request.clone()).await;
        let (_, body) = post_json(app(state), "/analyze-frame", request).await;
        assert_eq!(body["frame_saved"], true);
        body["frame_path"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_check_student_lists_captures() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(test_settings(&dir));
        capture_one(&state, "s-1").await;

        let (status, body) = post_json(app(&state), "/check-student", json!({"student_id": "s-1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["student_id"], "s-1");
        assert_eq!(body["suspicious_activity_count"], 1);
        assert_eq!(body["frames"][0]["reason"], "multiple_faces");

        let (_, empty) = post_json(app(&state), "/check-student", json!({"student_id": "nobody"})).await;
        assert_eq!(empty["suspicious_activity_count"], 0);
    }

    #[tokio::test]
    async fn test_check_student_requires_id() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(test_settings(&dir));

        let (status, body) = post_json(app(&state), "/check-student", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No student_id provided");
    }

    #[tokio::test]
    async fn test_get_frame_serves_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(test_settings(&dir));
        capture_one(&state, "s-1").await;

        let listed = state.artifacts.list("s-1").unwrap();
        let uri = format!("/get-frame/s-1/{}", listed[0].filename);
        let (status, bytes) = get(app(&state), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_get_frame_missing_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(test_settings(&dir));
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let (status, _) = get(app(&state), "/get-frame/s-1/missing.jpg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, bytes) = get(app(&state), "/get-frame/s-1/..%2F..%2Fsecret.txt").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Invalid path");

        // A dot-dot subject is just another (empty) subject directory
        let (status, _) = get(app(&state), "/get-frame/%2E%2E/secret.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_subject_ids_resolve_like_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(test_settings(&dir));
        capture_one(&state, "a/b").await;
        capture_one(&state, " s-1 ").await;

        let (status, body) = post_json(app(&state), "/check-student", json!({"student_id": "a/b"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suspicious_activity_count"], 1);

        let (_, other) = post_json(app(&state), "/check-student", json!({"student_id": "a_b"})).await;
        assert_eq!(other["suspicious_activity_count"], 0);

        let (_, trimmed) = post_json(app(&state), "/check-student", json!({"student_id": "s-1"})).await;
        assert_eq!(trimmed["student_id"], "s-1");
        assert_eq!(trimmed["suspicious_activity_count"], 1);

        let filename = body["frames"][0]["filename"].as_str().unwrap().to_string();
        let (status, _) = get(app(&state), &format!("/get-frame/a%2Fb/{}", filename)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get(app(&state), &format!("/get-frame/a_b/{}", filename)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
