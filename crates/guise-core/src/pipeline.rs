//! Per-frame orchestration: detect, track, switch identities, replace,
//! accumulate, and the frame loop around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::backend::Backend;
use crate::compose;
use crate::detect::{best_detection, FaceDetector};
use crate::frame::{FrameError, GrayFrame, RgbFrame};
use crate::geometry::{same_subject, Rect};
use crate::mask::{RadiusPair, RampMode};
use crate::person::{Person, PersonError};
use crate::recog::FaceRecognizer;

/// Divisor applied to `x_res * y_res` to derive the minimum detection
/// area, so the confidence requirement tracks frame size.
pub const AREA_THRESHOLD_DIVISOR: u64 = 16;

/// Default number of frames without a confirmed match before the next
/// confirmed detection is treated as a new person.
pub const DEFAULT_INTERPERSON_PERIOD: u32 = 20;

/// Kernel size of the smoothing post-filter applied before display.
const BLUR_KERNEL: usize = 9;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The acquisition source stopped yielding frames. This is a fatal
    /// condition, deliberately distinct from a requested cancellation.
    #[error("frame source stopped yielding frames")]
    SourceStopped,
    #[error("frame I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Person(#[from] PersonError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Why the frame loop ended cleanly.
#[derive(Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancellation token was set (user-requested termination).
    Cancelled,
}

/// Explicit cancellation token polled once per frame iteration, keeping
/// the loop's control flow linear instead of relying on an asynchronous
/// interrupt handler.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Source of input frames (a capture device, an image sequence, ...).
/// `Ok(None)` means the source is exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> std::io::Result<Option<RgbFrame>>;
}

/// Destination for composed frames (a display, an output directory, ...).
pub trait FrameSink {
    fn write_frame(&mut self, frame: &GrayFrame) -> std::io::Result<()>;
}

/// Tuning knobs for the per-frame pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Minimum detection area in pixels; derive from the output
    /// resolution via [`min_area_for`].
    pub min_area: u64,
    /// Frames without a confirmed match before an identity switch.
    pub interperson_period: u32,
    pub radii: RadiusPair,
    pub mode: RampMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_area: min_area_for(1280, 720),
            interperson_period: DEFAULT_INTERPERSON_PERIOD,
            radii: RadiusPair::CALIBRATED,
            mode: RampMode::Dual,
        }
    }
}

/// Minimum qualifying detection area for an output resolution.
pub fn min_area_for(x_res: u64, y_res: u64) -> u64 {
    x_res * y_res / AREA_THRESHOLD_DIVISOR
}

/// Per-frame face replacement.
///
/// Owns exactly two identity buffers: `previous` (frozen, the replacement
/// lookup target) and `current` (accumulating). Ownership moves from
/// current to previous at an identity switch; nothing else touches them.
pub struct ReplacementPipeline<D, R, B> {
    detector: D,
    recognizer: R,
    backend: B,
    previous: Person,
    current: Person,
    last_face: Rect,
    frames_since_match: u32,
    config: PipelineConfig,
}

impl<D, R, B> ReplacementPipeline<D, R, B>
where
    D: FaceDetector,
    R: FaceRecognizer,
    B: Backend,
{
    /// Build a pipeline around an already-trained frozen Person.
    pub fn new(detector: D, recognizer: R, backend: B, previous: Person, config: PipelineConfig) -> Self {
        Self {
            detector,
            recognizer,
            backend,
            previous,
            current: Person::new(),
            last_face: Rect::empty(),
            frames_since_match: 0,
            config,
        }
    }

    /// Samples accumulated for the current (not yet frozen) person.
    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Process one frame: detect, track, possibly switch identities,
    /// substitute the tracked face, accumulate a training sample, and
    /// smooth the result.
    ///
    /// A missing or undersized detection is not an error; the frame
    /// passes through with only the smoothing filter applied.
    pub fn process_frame(&mut self, frame: &RgbFrame) -> Result<GrayFrame, PipelineError> {
        let mut gray = frame.to_gray();

        let previous_face = self.last_face;
        // Detectors may report rectangles spilling past the frame edge;
        // only the in-frame part is usable. A detection clamped down to
        // nothing counts as no detection.
        let bounds = Rect::new(0, 0, gray.width() as u32, gray.height() as u32);
        let face = best_detection(&mut self.detector, &gray, self.config.min_area)
            .map(|r| r.intersection(&bounds))
            .unwrap_or_else(Rect::empty);
        self.last_face = face;

        // Training samples are cut from the unmodified frame, before any
        // replacement is composited in.
        let training_sample = if face.is_empty() {
            None
        } else {
            Some(gray.crop(&face)?)
        };

        if !face.is_empty() && same_subject(&face, &previous_face) {
            if self.frames_since_match > self.config.interperson_period {
                self.switch_identity()?;
            }

            if let Some(replacement) =
                self.previous.replacement(&gray, &face, &mut self.recognizer)?
            {
                let replacement = replacement.clone();
                self.substitute(&mut gray, &face, &replacement)?;
            }
            self.frames_since_match = 0;
        }

        if let Some(sample) = training_sample {
            let (w, h) = self
                .previous
                .canonical_size()
                .unwrap_or((sample.width(), sample.height()));
            self.current.update(sample.resize(w, h));
        }

        self.frames_since_match = self.frames_since_match.saturating_add(1);

        Ok(gray.gaussian_blur(BLUR_KERNEL))
    }

    /// Freeze the accumulating Person, retrain the recognizer on it, and
    /// start a fresh one. Skipped while the accumulator is still empty —
    /// the seed Person then remains the lookup target.
    fn switch_identity(&mut self) -> Result<(), PipelineError> {
        if self.current.is_empty() {
            tracing::debug!("identity switch elapsed but no samples accumulated; keeping previous");
            return Ok(());
        }
        self.previous = std::mem::take(&mut self.current);
        self.previous.train(&mut self.recognizer).map_err(PersonError::from)?;
        tracing::info!(samples = self.previous.len(), "identity switch: new lookup target trained");
        Ok(())
    }

    /// Blend the replacement over the inner 80% of the detected
    /// rectangle, leaving a 10% border untouched on each side so the
    /// composite keeps a natural frame.
    fn substitute(
        &mut self,
        gray: &mut GrayFrame,
        face: &Rect,
        replacement: &GrayFrame,
    ) -> Result<(), PipelineError> {
        let face_inner = face.inner_margin(1, 10);
        if face_inner.is_empty() {
            return Ok(());
        }

        let scaled = replacement.resize(face.width as usize, face.height as usize);
        let scaled_inner = Rect::new(0, 0, face.width, face.height).inner_margin(1, 10);
        let fg = scaled.crop(&scaled_inner)?;
        let bg = gray.crop(&face_inner)?;

        let blended = compose::blend(&bg, &fg, self.config.radii, self.config.mode, &self.backend);
        gray.paste(&face_inner, &blended)?;
        Ok(())
    }

    /// Synchronous frame loop: acquisition, processing, and output happen
    /// in strict sequence. The cancellation token is polled once per
    /// iteration; an exhausted source is a fatal error.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> Result<LoopExit, PipelineError> {
        let mut frames = 0u64;
        let mut total = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(frames, "cancellation requested; stopping frame loop");
                return Ok(LoopExit::Cancelled);
            }

            let Some(frame) = source.next_frame()? else {
                tracing::error!(frames, "frame source stopped yielding frames");
                return Err(PipelineError::SourceStopped);
            };

            let start = Instant::now();
            let out = self.process_frame(&frame)?;
            sink.write_frame(&out)?;

            frames += 1;
            total += start.elapsed();
            if total > Duration::ZERO {
                // Frame rate is observed, never enforced.
                tracing::debug!(
                    frame = frames,
                    fps = frames as f64 / total.as_secs_f64(),
                    "frame processed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HostBackend;
    use crate::detect::SidecarDetector;
    use crate::recog::HistogramRecognizer;

    fn rgb_frame(level: u8, w: usize, h: usize) -> RgbFrame {
        RgbFrame::from_raw(vec![level; w * h * 3], w, h).unwrap()
    }

    fn seeded_person() -> Person {
        let mut p = Person::new();
        p.update(GrayFrame::filled(10, 8, 8));
        p.update(GrayFrame::filled(200, 8, 8));
        p
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            min_area: 200,
            interperson_period: 3,
            ..PipelineConfig::default()
        }
    }

    fn pipeline(
        detections: Vec<Vec<Rect>>,
    ) -> ReplacementPipeline<SidecarDetector, HistogramRecognizer, HostBackend> {
        let previous = seeded_person();
        let mut recognizer = HistogramRecognizer::new();
        previous.train(&mut recognizer).unwrap();
        ReplacementPipeline::new(
            SidecarDetector::new(detections),
            recognizer,
            HostBackend,
            previous,
            test_config(),
        )
    }

    #[test]
    fn test_no_detection_passes_frame_through() {
        let mut p = pipeline(vec![vec![]]);
        let out = p.process_frame(&rgb_frame(128, 64, 64)).unwrap();
        // Uniform frame: blur is the identity, replacement never ran
        assert!(out.data().iter().all(|&px| px == 128));
        assert_eq!(p.current_len(), 0);
    }

    #[test]
    fn test_undersized_detection_is_no_detection() {
        // Area 100 against threshold 200: buffer must stay unchanged
        let mut p = pipeline(vec![vec![Rect::new(0, 0, 10, 10)]]);
        p.process_frame(&rgb_frame(128, 64, 64)).unwrap();
        assert_eq!(p.current_len(), 0);
    }

    #[test]
    fn test_valid_detection_accumulates_sample() {
        let mut p = pipeline(vec![vec![Rect::new(8, 8, 20, 20)]]);
        p.process_frame(&rgb_frame(128, 64, 64)).unwrap();
        assert_eq!(p.current_len(), 1);
    }

    #[test]
    fn test_out_of_bounds_detection_is_clamped() {
        // Rect spills past the 64x64 frame on both axes; the frame must
        // pass through (no crop failure) and the in-frame 24x24 part is
        // what gets accumulated and, on the second frame, replaced.
        let rect = Rect::new(40, 40, 40, 40);
        let mut p = pipeline(vec![vec![rect], vec![rect]]);
        p.process_frame(&rgb_frame(100, 64, 64)).unwrap();
        let out = p.process_frame(&rgb_frame(100, 64, 64)).unwrap();
        assert_eq!(out.width(), 64);
        assert_eq!(p.current_len(), 2);
    }

    #[test]
    fn test_negative_origin_detection_is_clamped() {
        let rect = Rect::new(-10, -10, 40, 40);
        let mut p = pipeline(vec![vec![rect]]);
        p.process_frame(&rgb_frame(100, 64, 64)).unwrap();
        assert_eq!(p.current_len(), 1);
    }

    #[test]
    fn test_continuity_match_replaces_face() {
        // Same rect twice: IoU 1.0, second frame is continuity-confirmed
        let rect = Rect::new(10, 10, 30, 30);
        let mut p = pipeline(vec![vec![rect], vec![rect]]);
        p.process_frame(&rgb_frame(30, 64, 64)).unwrap();
        let out = p.process_frame(&rgb_frame(30, 64, 64)).unwrap();

        // The dark (level 10) seed sample wins the histogram lookup and is
        // blended over the inner crop; the face center must have moved
        // toward it from the input level 30.
        let center = out.pixel(25, 25);
        assert!(center < 30, "center {center} should be darkened by the replacement");
    }

    #[test]
    fn test_no_switch_within_interperson_period() {
        // Two overlapping detections on consecutive frames, well inside
        // the period: the frozen person must stay the seed person.
        let a = Rect::new(10, 10, 100, 100);
        let b = Rect::new(12, 12, 100, 100); // IoU ~0.8
        let mut p = pipeline(vec![vec![a], vec![b]]);
        p.process_frame(&rgb_frame(100, 128, 128)).unwrap();
        p.process_frame(&rgb_frame(100, 128, 128)).unwrap();
        // No switch: the current accumulator kept both samples
        assert_eq!(p.current_len(), 2);
        assert_eq!(p.previous.len(), 2); // seed person untouched
    }

    #[test]
    fn test_switch_after_gap_promotes_current() {
        let rect = Rect::new(10, 10, 100, 100);
        let mut detections = vec![vec![rect]];
        // Long gap with no detection, then two confirmed frames
        for _ in 0..6 {
            detections.push(vec![]);
        }
        detections.push(vec![rect]);
        detections.push(vec![rect]);

        let mut p = pipeline(detections);
        for _ in 0..9 {
            p.process_frame(&rgb_frame(100, 128, 128)).unwrap();
        }
        // After the gap the second confirmed frame triggered the switch:
        // the old accumulator (1 sample from frame 0, 1 from frame 8)
        // became the frozen person.
        assert!(p.previous.len() >= 1);
        assert!(p.previous.canonical_size().is_some());
    }

    #[test]
    fn test_run_cancellation_is_clean() {
        struct Endless;
        impl FrameSource for Endless {
            fn next_frame(&mut self) -> std::io::Result<Option<RgbFrame>> {
                Ok(Some(RgbFrame::from_raw(vec![0; 16 * 16 * 3], 16, 16).unwrap()))
            }
        }
        struct Null;
        impl FrameSink for Null {
            fn write_frame(&mut self, _frame: &GrayFrame) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut p = pipeline(vec![]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let exit = p.run(&mut Endless, &mut Null, &cancel).unwrap();
        assert_eq!(exit, LoopExit::Cancelled);
    }

    #[test]
    fn test_run_source_exhaustion_is_fatal() {
        struct Dry;
        impl FrameSource for Dry {
            fn next_frame(&mut self) -> std::io::Result<Option<RgbFrame>> {
                Ok(None)
            }
        }
        struct Null;
        impl FrameSink for Null {
            fn write_frame(&mut self, _frame: &GrayFrame) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut p = pipeline(vec![]);
        let err = p.run(&mut Dry, &mut Null, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, PipelineError::SourceStopped));
    }

    #[test]
    fn test_min_area_for_tracks_resolution() {
        assert_eq!(min_area_for(1280, 720), 1280 * 720 / 16);
        assert_eq!(min_area_for(4, 4), 1);
    }
}
