//! Visibility verdicts and reason codes

use std::fmt;

use serde::{Serialize, Serializer};

use crate::detector::DetectionBox;

/// Why a frame was (or was not) judged acceptable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Exactly one face, large enough and clear of the frame edges
    Ok,

    /// No face located
    FaceNotDetected,

    /// More than one face located
    MultipleFaces,

    /// Single face touching the edge margin
    FaceOutOfFrame,

    /// Single face too small relative to the frame
    FacePartiallyVisible,

    /// Frame could not be decoded or has no area
    InvalidFrame,

    /// Classification failed unexpectedly
    Error(String),
}

impl Reason {
    pub fn is_ok(&self) -> bool {
        matches!(self, Reason::Ok)
    }

    /// Stable label without free-form detail; safe for file names and metric labels
    pub fn label(&self) -> &'static str {
        match self {
            Reason::Ok => "ok",
            Reason::FaceNotDetected => "face_not_detected",
            Reason::MultipleFaces => "multiple_faces",
            Reason::FaceOutOfFrame => "face_out_of_frame",
            Reason::FacePartiallyVisible => "face_partially_visible",
            Reason::InvalidFrame => "invalid_frame",
            Reason::Error(_) => "error",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Error(detail) => write!(f, "error: {}", detail),
            other => f.write_str(other.label()),
        }
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of classifying one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibilityVerdict {
    /// Whether at least one face was located
    pub face_detected: bool,

    /// Whether the single located face is acceptably visible
    pub fully_visible: bool,

    /// Face box area over frame area, in [0, 1]
    #[serde(rename = "face_coverage")]
    pub coverage: f64,

    /// Location of the face (single-face verdicts only)
    #[serde(rename = "face_location", skip_serializing_if = "Option::is_none")]
    pub location: Option<DetectionBox>,

    /// Number of faces located (multiple-face verdicts only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_count: Option<usize>,

    pub reason: Reason,
}

impl VisibilityVerdict {
    /// Whether this verdict is an anomaly for debounce purposes
    pub fn cheating_flag(&self) -> bool {
        !self.reason.is_ok()
    }

    /// Verdict for a frame that could not be interpreted
    pub fn invalid_frame() -> Self {
        Self::failed(Reason::InvalidFrame)
    }

    /// Verdict for an unexpected classification failure
    pub fn error(detail: impl Into<String>) -> Self {
        Self::failed(Reason::Error(detail.into()))
    }

    fn failed(reason: Reason) -> Self {
        Self {
            face_detected: false,
            fully_visible: false,
            coverage: 0.0,
            location: None,
            face_count: None,
            reason,
        }
    }
}
