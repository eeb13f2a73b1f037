//! Face detector seam, detection gating, and a sidecar-replay detector.

use std::io::Read;

use thiserror::Error;

use crate::frame::GrayFrame;
use crate::geometry::{largest_rect, Rect};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("sidecar read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sidecar parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strategy for locating candidate face rectangles in a grayscale frame.
pub trait FaceDetector {
    fn detect(&mut self, frame: &GrayFrame) -> Vec<Rect>;
}

/// Reduce raw detections to the single largest qualifying rectangle.
///
/// A detection whose area is below `min_area` is treated exactly like no
/// detection at all; the threshold scales with output resolution so the
/// confidence requirement tracks frame size.
pub fn best_detection(
    detector: &mut dyn FaceDetector,
    frame: &GrayFrame,
    min_area: u64,
) -> Option<Rect> {
    let rects = detector.detect(frame);
    let largest = largest_rect(&rects)?;
    if largest.area() < min_area {
        tracing::debug!(
            area = largest.area(),
            min_area,
            "largest detection below threshold; treating as no detection"
        );
        return None;
    }
    Some(largest)
}

/// Detector that replays pre-annotated per-frame rectangles from a JSON
/// sidecar (an array of per-frame rect arrays). Used for offline runs and
/// deterministic tests; frames beyond the annotated range yield nothing.
pub struct SidecarDetector {
    frames: Vec<Vec<Rect>>,
    cursor: usize,
}

impl SidecarDetector {
    pub fn new(frames: Vec<Vec<Rect>>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, DetectError> {
        let frames: Vec<Vec<Rect>> = serde_json::from_reader(reader)?;
        Ok(Self::new(frames))
    }
}

impl FaceDetector for SidecarDetector {
    fn detect(&mut self, _frame: &GrayFrame) -> Vec<Rect> {
        let rects = self.frames.get(self.cursor).cloned().unwrap_or_default();
        self.cursor += 1;
        rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_detection_picks_largest() {
        let mut det = SidecarDetector::new(vec![vec![
            Rect::new(0, 0, 10, 10),
            Rect::new(0, 0, 30, 30),
        ]]);
        let frame = GrayFrame::filled(0, 64, 64);
        assert_eq!(
            best_detection(&mut det, &frame, 1),
            Some(Rect::new(0, 0, 30, 30))
        );
    }

    #[test]
    fn test_best_detection_applies_threshold() {
        // Area 100 with threshold 200 is "no detection"
        let mut det = SidecarDetector::new(vec![vec![Rect::new(0, 0, 10, 10)]]);
        let frame = GrayFrame::filled(0, 64, 64);
        assert_eq!(best_detection(&mut det, &frame, 200), None);
    }

    #[test]
    fn test_best_detection_empty() {
        let mut det = SidecarDetector::new(vec![vec![]]);
        let frame = GrayFrame::filled(0, 64, 64);
        assert_eq!(best_detection(&mut det, &frame, 1), None);
    }

    #[test]
    fn test_sidecar_replays_in_order_then_runs_dry() {
        let mut det = SidecarDetector::new(vec![
            vec![Rect::new(1, 1, 5, 5)],
            vec![],
        ]);
        let frame = GrayFrame::filled(0, 8, 8);
        assert_eq!(det.detect(&frame), vec![Rect::new(1, 1, 5, 5)]);
        assert!(det.detect(&frame).is_empty());
        assert!(det.detect(&frame).is_empty());
    }

    #[test]
    fn test_sidecar_from_reader() {
        let json = r#"[[{"x":2,"y":3,"width":4,"height":5}],[]]"#;
        let mut det = SidecarDetector::from_reader(json.as_bytes()).unwrap();
        let frame = GrayFrame::filled(0, 8, 8);
        assert_eq!(det.detect(&frame), vec![Rect::new(2, 3, 4, 5)]);
    }
}
