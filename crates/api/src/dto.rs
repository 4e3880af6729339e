//! Request and response bodies

use serde::{Deserialize, Serialize};
use storage::ArtifactEntry;
use visibility::VisibilityVerdict;

use crate::config::ConfigSummary;

/// Reason reported for frames the sampler passed over
pub const SKIPPED_REASON: &str = "frame_skipped_for_performance";

/// Exam clients send student ids as strings or bare numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Text(String),
    Number(serde_json::Number),
}

impl SubjectId {
    pub fn as_string(&self) -> String {
        match self {
            SubjectId::Text(s) => s.clone(),
            SubjectId::Number(n) => n.to_string(),
        }
    }
}

/// `POST /analyze-frame` and `POST /test-detection`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub frame: Option<String>,
    pub student_id: Option<SubjectId>,
    /// Classify even if the sampler would skip this frame
    #[serde(default)]
    pub force_process: bool,
}

/// `POST /batch-analyze`
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub frames: Option<Vec<String>>,
    pub student_id: Option<SubjectId>,
}

/// `POST /check-student`
#[derive(Debug, Deserialize)]
pub struct CheckStudentRequest {
    pub student_id: Option<SubjectId>,
}

/// Verdict of one classified frame plus what the gate did with it
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    #[serde(flatten)]
    pub verdict: VisibilityVerdict,
    pub cheating_detected: bool,
    pub frame_skipped: bool,
    pub frame_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_path: Option<String>,
}

impl FrameReport {
    pub fn new(verdict: VisibilityVerdict) -> Self {
        Self {
            cheating_detected: verdict.cheating_flag(),
            verdict,
            frame_skipped: false,
            frame_saved: false,
            frame_path: None,
        }
    }
}

/// Placeholder body for a frame the sampler skipped; assumes the face is fine
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFrame {
    pub frame_skipped: bool,
    pub face_detected: bool,
    pub fully_visible: bool,
    pub cheating_detected: bool,
    pub reason: &'static str,
    pub message: &'static str,
}

impl Default for SkippedFrame {
    fn default() -> Self {
        Self {
            frame_skipped: true,
            face_detected: true,
            fully_visible: true,
            cheating_detected: false,
            reason: SKIPPED_REASON,
            message: "Frame skipped to reduce CPU load",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Analyzed(FrameReport),
    Skipped(SkippedFrame),
}

/// `POST /test-detection` response
#[derive(Debug, Clone, Serialize)]
pub struct TestDetectionResponse {
    #[serde(flatten)]
    pub verdict: VisibilityVerdict,
    pub cheating_detected: bool,
    pub test_mode: bool,
    pub message: &'static str,
}

impl TestDetectionResponse {
    pub fn new(verdict: VisibilityVerdict) -> Self {
        Self {
            cheating_detected: verdict.cheating_flag(),
            verdict,
            test_mode: true,
            message: "Test mode - frame not saved",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFrameResult {
    pub frame_index: usize,
    #[serde(flatten)]
    pub report: FrameReport,
}

/// `POST /batch-analyze` response
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub total_frames: usize,
    pub cheating_detected_count: usize,
    pub saved_count: usize,
    pub results: Vec<BatchFrameResult>,
}

/// `POST /check-student` response
#[derive(Debug, Clone, Serialize)]
pub struct CheckStudentResponse {
    pub student_id: String,
    pub suspicious_activity_count: usize,
    pub frames: Vec<ArtifactEntry>,
}

/// `GET /health` response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: String,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub detector_backend: &'static str,
    pub tracked_subjects: usize,
    pub configuration: ConfigSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subject_id_accepts_numbers() {
        let req: AnalyzeRequest = serde_json::from_value(json!({"frame": "x", "student_id": 42})).unwrap();
        assert_eq!(req.student_id.unwrap().as_string(), "42");
        assert!(!req.force_process);

        let req: AnalyzeRequest = serde_json::from_value(json!({"student_id": "s-1"})).unwrap();
        assert_eq!(req.student_id.unwrap().as_string(), "s-1");
        assert!(req.frame.is_none());
    }

    #[test]
    fn test_report_flattens_verdict() {
        let report = FrameReport::new(VisibilityVerdict::invalid_frame());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["reason"], "invalid_frame");
        assert_eq!(value["cheating_detected"], true);
        assert_eq!(value["frame_saved"], false);
        assert_eq!(value["face_coverage"], 0.0);
        assert!(value.get("frame_path").is_none());
    }

    #[test]
    fn test_skipped_body() {
        let value = serde_json::to_value(AnalyzeResponse::Skipped(SkippedFrame::default())).unwrap();
        assert_eq!(value["frame_skipped"], true);
        assert_eq!(value["cheating_detected"], false);
        assert_eq!(value["reason"], SKIPPED_REASON);
    }
}
