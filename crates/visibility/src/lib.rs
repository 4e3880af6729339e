//! Face Visibility Classification
//!
//! Turns a camera frame into a visibility verdict:
//! - Face location behind a pluggable [`FaceLocator`]
//! - Coverage and edge-margin geometry
//! - Reason codes for every anomaly (no face, several faces, out of frame, too small)

pub mod classifier;
pub mod config;
pub mod detector;
pub mod verdict;

pub use classifier::classify;
pub use config::{DetectorTuning, VisibilityConfig, LENIENT_COVERAGE};
pub use detector::{DetectionBox, FaceLocator, RustfaceLocator};
pub use verdict::{Reason, VisibilityVerdict};

use std::sync::Arc;

use frame_codec::{decode_base64, Frame};
use thiserror::Error;
use tracing::{debug, warn};

/// Visibility error types
#[derive(Error, Debug)]
pub enum VisibilityError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A verdict together with the decoded frame it was computed from
#[derive(Debug, Clone)]
pub struct Analysis {
    pub verdict: VisibilityVerdict,
    /// Absent when the payload could not be decoded
    pub frame: Option<Frame>,
}

/// Locator plus thresholds; cheap to clone and share across handlers
#[derive(Clone)]
pub struct VisibilityClassifier {
    config: Arc<VisibilityConfig>,
    locator: Arc<dyn FaceLocator>,
}

impl VisibilityClassifier {
    pub fn new(config: VisibilityConfig, locator: Arc<dyn FaceLocator>) -> Self {
        Self {
            config: Arc::new(config),
            locator,
        }
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.locator.backend()
    }

    /// Classify a decoded frame. Locator failures become `error: ...` verdicts.
    pub fn analyze(&self, frame: &Frame) -> VisibilityVerdict {
        let geometry = frame.geometry();
        if !geometry.is_valid() {
            return VisibilityVerdict::invalid_frame();
        }

        match self.locator.locate(&frame.to_grayscale()) {
            Ok(boxes) => {
                debug!("Located {} face(s) in {}x{} frame", boxes.len(), geometry.width, geometry.height);
                classify(geometry, &boxes, &self.config)
            }
            Err(e) => {
                warn!("Face location failed: {}", e);
                VisibilityVerdict::error(e.to_string())
            }
        }
    }

    /// Decode a base64 payload and classify it
    pub fn analyze_encoded(&self, payload: &str) -> Analysis {
        match decode_base64(payload) {
            Ok(frame) => Analysis {
                verdict: self.analyze(&frame),
                frame: Some(frame),
            },
            Err(e) => {
                debug!("Rejecting undecodable frame: {}", e);
                Analysis {
                    verdict: VisibilityVerdict::invalid_frame(),
                    frame: None,
                }
            }
        }
    }
}
