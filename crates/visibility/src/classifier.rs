//! Geometric visibility classification

use frame_codec::FrameGeometry;

use crate::config::{VisibilityConfig, LENIENT_COVERAGE};
use crate::detector::DetectionBox;
use crate::verdict::{Reason, VisibilityVerdict};

/// Classify detector output against frame geometry.
///
/// Pure: the same inputs always yield the same verdict.
pub fn classify(
    geometry: FrameGeometry,
    detections: &[DetectionBox],
    config: &VisibilityConfig,
) -> VisibilityVerdict {
    if !geometry.is_valid() {
        return VisibilityVerdict::invalid_frame();
    }

    match detections {
        [] => VisibilityVerdict {
            face_detected: false,
            fully_visible: false,
            coverage: 0.0,
            location: None,
            face_count: None,
            reason: Reason::FaceNotDetected,
        },
        [face] => classify_single(geometry, *face, config),
        // Never pick the largest box: identity ambiguity is itself the anomaly
        many => VisibilityVerdict {
            face_detected: true,
            fully_visible: false,
            coverage: 0.0,
            location: None,
            face_count: Some(many.len()),
            reason: Reason::MultipleFaces,
        },
    }
}

fn classify_single(
    geometry: FrameGeometry,
    face: DetectionBox,
    config: &VisibilityConfig,
) -> VisibilityVerdict {
    let coverage = (face.area() as f64 / geometry.area() as f64).min(1.0);
    let at_edge = touches_edge(geometry, face, config.edge_margin_pixels);

    let mut fully_visible = coverage >= config.coverage_threshold && !at_edge;
    // Ordinary sitting distance keeps the face small; accept anything above
    // the lenient floor that is clear of the edges.
    if coverage >= LENIENT_COVERAGE && !at_edge {
        fully_visible = true;
    }

    let reason = if fully_visible {
        Reason::Ok
    } else if at_edge {
        Reason::FaceOutOfFrame
    } else {
        Reason::FacePartiallyVisible
    };

    VisibilityVerdict {
        face_detected: true,
        fully_visible,
        coverage,
        location: Some(face),
        face_count: None,
        reason,
    }
}

/// Whether the box lies within `margin` pixels of (or beyond) any frame border
fn touches_edge(geometry: FrameGeometry, face: DetectionBox, margin: u32) -> bool {
    let margin = margin as i64;
    let (x, y) = (face.x as i64, face.y as i64);
    let right = x + face.width as i64;
    let bottom = y + face.height as i64;

    x < margin
        || y < margin
        || right > geometry.width as i64 - margin
        || bottom > geometry.height as i64 - margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FRAME: FrameGeometry = FrameGeometry { width: 640, height: 480 };

    fn centered_box(coverage: f64) -> DetectionBox {
        let side = ((FRAME.area() as f64) * coverage).sqrt() as u32;
        DetectionBox::new(
            (FRAME.width as i32 - side as i32) / 2,
            (FRAME.height as i32 - side as i32) / 2,
            side,
            side,
        )
    }

    #[test]
    fn test_well_framed_face_is_ok() {
        let verdict = classify(FRAME, &[centered_box(0.20)], &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::Ok);
        assert!(verdict.fully_visible);
        assert!(!verdict.cheating_flag());
        assert!((verdict.coverage - 0.20).abs() < 0.01);
        assert!(verdict.location.is_some());
    }

    #[test]
    fn test_small_face_is_partially_visible() {
        let config = VisibilityConfig {
            coverage_threshold: 0.08,
            ..Default::default()
        };
        let verdict = classify(FRAME, &[centered_box(0.03)], &config);
        assert_eq!(verdict.reason, Reason::FacePartiallyVisible);
        assert!(verdict.face_detected);
        assert!(verdict.cheating_flag());
    }

    #[test]
    fn test_no_face() {
        let verdict = classify(FRAME, &[], &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::FaceNotDetected);
        assert!(!verdict.face_detected);
        assert!(verdict.cheating_flag());
    }

    #[test]
    fn test_two_faces() {
        let faces = [centered_box(0.20), DetectionBox::new(10, 10, 20, 20)];
        let verdict = classify(FRAME, &faces, &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::MultipleFaces);
        assert_eq!(verdict.face_count, Some(2));
        assert!(verdict.face_detected);
        assert!(!verdict.fully_visible);
    }

    #[test]
    fn test_edge_touch_is_out_of_frame() {
        // Large face hugging the left border
        let face = DetectionBox::new(2, 100, 300, 300);
        let verdict = classify(FRAME, &[face], &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::FaceOutOfFrame);

        // Box extending past the bottom border
        let face = DetectionBox::new(200, 300, 200, 200);
        let verdict = classify(FRAME, &[face], &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::FaceOutOfFrame);
    }

    #[test]
    fn test_exactly_at_margin_is_inside() {
        let config = VisibilityConfig::default();
        let m = config.edge_margin_pixels;
        let face = DetectionBox::new(m as i32, m as i32, FRAME.width - 2 * m, FRAME.height - 2 * m);
        let verdict = classify(FRAME, &[face], &config);
        assert_eq!(verdict.reason, Reason::Ok);
    }

    #[test]
    fn test_lenient_floor_overrides_high_threshold() {
        let config = VisibilityConfig {
            coverage_threshold: 0.30,
            ..Default::default()
        };
        let verdict = classify(FRAME, &[centered_box(0.10)], &config);
        assert_eq!(verdict.reason, Reason::Ok);

        let verdict = classify(FRAME, &[centered_box(0.04)], &config);
        assert_eq!(verdict.reason, Reason::FacePartiallyVisible);
    }

    #[test]
    fn test_low_threshold_below_lenient_floor() {
        let config = VisibilityConfig {
            coverage_threshold: 0.02,
            ..Default::default()
        };
        let verdict = classify(FRAME, &[centered_box(0.03)], &config);
        assert_eq!(verdict.reason, Reason::Ok);
    }

    #[test]
    fn test_zero_area_frame_is_invalid() {
        let verdict = classify(FrameGeometry::new(0, 480), &[], &VisibilityConfig::default());
        assert_eq!(verdict.reason, Reason::InvalidFrame);
        assert!(verdict.cheating_flag());
    }

    proptest! {
        #[test]
        fn multiple_faces_always_flagged(
            boxes in prop::collection::vec((0i32..600, 0i32..440, 1u32..400, 1u32..400), 2..6)
        ) {
            let faces: Vec<_> = boxes
                .into_iter()
                .map(|(x, y, w, h)| DetectionBox::new(x, y, w, h))
                .collect();
            let verdict = classify(FRAME, &faces, &VisibilityConfig::default());
            prop_assert_eq!(&verdict.reason, &Reason::MultipleFaces);
            prop_assert!(verdict.cheating_flag());
        }

        #[test]
        fn coverage_stays_in_unit_range(x in -100i32..700, y in -100i32..500, w in 1u32..2000, h in 1u32..2000) {
            let verdict = classify(FRAME, &[DetectionBox::new(x, y, w, h)], &VisibilityConfig::default());
            prop_assert!(verdict.coverage >= 0.0 && verdict.coverage <= 1.0);
            prop_assert_eq!(verdict.fully_visible, verdict.reason == Reason::Ok);
        }
    }
}
