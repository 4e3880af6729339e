//! Face location backends

use std::fs::File;
use std::io::BufReader;

use frame_codec::GrayView;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::DetectorTuning;
use crate::VisibilityError;

/// Face bounding box in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

impl DetectionBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Anything that can locate faces in a grayscale frame.
///
/// Backends are shared across request handlers, so `locate` takes `&self`.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, gray: &GrayView) -> Result<Vec<DetectionBox>, VisibilityError>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str {
        "custom"
    }
}

/// Face locator backed by the SeetaFace cascade (`rustface`).
///
/// `min_neighbors` has no counterpart here: the SeetaFace pipeline merges
/// overlapping windows itself.
pub struct RustfaceLocator {
    model: rustface::Model,
    min_face_size: u32,
    pyramid_scale: f32,
}

impl RustfaceLocator {
    /// Load the model named by the tuning config
    pub fn new(tuning: &DetectorTuning) -> Result<Self, VisibilityError> {
        let path = tuning.model_path.as_deref().ok_or_else(|| {
            VisibilityError::Config("face model path is not configured".into())
        })?;

        info!("Loading face detection model from {}", path);
        let file = File::open(path).map_err(|e| {
            error!("Failed to open face model: {}", e);
            VisibilityError::ModelLoad(format!("{}: {}", path, e))
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| {
            error!("Failed to parse face model: {}", e);
            VisibilityError::ModelLoad(format!("{}: {}", path, e))
        })?;

        Self::with_model(model, tuning)
    }

    /// Build from an already-loaded model
    pub fn with_model(model: rustface::Model, tuning: &DetectorTuning) -> Result<Self, VisibilityError> {
        if tuning.scale_factor <= 1.0 {
            return Err(VisibilityError::Config(format!(
                "scale factor must be > 1.0, got {}",
                tuning.scale_factor
            )));
        }

        Ok(Self {
            model,
            min_face_size: tuning.min_face_size.max(20),
            // Cascade scale step 1.1 shrinks the image to 1/1.1 per pyramid level
            pyramid_scale: 1.0 / tuning.scale_factor,
        })
    }
}

impl FaceLocator for RustfaceLocator {
    fn locate(&self, gray: &GrayView) -> Result<Vec<DetectionBox>, VisibilityError> {
        if gray.data.len() != gray.width as usize * gray.height as usize {
            return Err(VisibilityError::Detection(format!(
                "grayscale buffer of {} bytes does not match {}x{}",
                gray.data.len(),
                gray.width,
                gray.height
            )));
        }

        // Detectors are stateful; one per call keeps the locator shareable
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(self.pyramid_scale);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(&gray.data, gray.width, gray.height));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                DetectionBox::new(bbox.x(), bbox.y(), bbox.width(), bbox.height())
            })
            .collect())
    }

    fn backend(&self) -> &'static str {
        "rustface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_area() {
        assert_eq!(DetectionBox::new(10, 10, 40, 50).area(), 2000);
    }

    #[test]
    fn test_box_serializes_short_keys() {
        let json = serde_json::to_value(DetectionBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, serde_json::json!({"x": 1, "y": 2, "w": 3, "h": 4}));
    }

    #[test]
    fn test_missing_model_path() {
        let tuning = DetectorTuning::default();
        assert!(matches!(
            RustfaceLocator::new(&tuning),
            Err(VisibilityError::Config(_))
        ));
    }

    #[test]
    fn test_unreadable_model_is_load_error() {
        let tuning = DetectorTuning {
            model_path: Some("/nonexistent/seeta_fd_frontal_v1.0.bin".into()),
            ..Default::default()
        };
        assert!(matches!(
            RustfaceLocator::new(&tuning),
            Err(VisibilityError::ModelLoad(_))
        ));
    }
}
