//! Visibility configuration

use serde::{Deserialize, Serialize};

/// Coverage above which a face always counts as visible (when clear of the edges),
/// regardless of the configured threshold.
pub const LENIENT_COVERAGE: f64 = 0.05;

/// Visibility thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Minimum face area over frame area
    pub coverage_threshold: f64,

    /// Distance from a frame border (pixels) that counts as touching the edge
    pub edge_margin_pixels: u32,

    /// Detector tuning
    pub detector: DetectorTuning,
}

/// Face locator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorTuning {
    /// Minimum face size to locate (pixels)
    pub min_face_size: u32,

    /// Image pyramid step between scales (> 1.0; lower = more accurate but slower)
    pub scale_factor: f32,

    /// Candidate neighbors required to keep a detection (cascade backends)
    pub min_neighbors: u32,

    /// Model path for the bundled backend
    pub model_path: Option<String>,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            coverage_threshold: 0.08,
            edge_margin_pixels: 5,
            detector: DetectorTuning::default(),
        }
    }
}

impl Default for DetectorTuning {
    fn default() -> Self {
        Self {
            min_face_size: 40,
            scale_factor: 1.1,
            min_neighbors: 3,
            model_path: None,
        }
    }
}

impl VisibilityConfig {
    /// Create strict config (face must fill more of the frame)
    pub fn strict() -> Self {
        Self {
            coverage_threshold: 0.15,
            edge_margin_pixels: 10,
            ..Default::default()
        }
    }

    /// Create lenient config
    pub fn lenient() -> Self {
        Self {
            coverage_threshold: 0.03,
            edge_margin_pixels: 2,
            ..Default::default()
        }
    }
}
