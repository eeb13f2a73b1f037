//! End-to-end pipeline scenarios through the public API, including the
//! host/parallel execution parity contract.

use guise_core::backend::{HostBackend, ParallelBackend};
use guise_core::detect::SidecarDetector;
use guise_core::frame::{GrayFrame, RgbFrame};
use guise_core::geometry::Rect;
use guise_core::pipeline::{
    CancelToken, FrameSink, FrameSource, PipelineConfig, PipelineError, ReplacementPipeline,
};
use guise_core::person::Person;
use guise_core::recog::HistogramRecognizer;

fn textured_rgb(seed: u8, w: usize, h: usize) -> RgbFrame {
    RgbFrame::from_raw(
        (0..w * h * 3).map(|i| seed.wrapping_add((i % 97) as u8)).collect(),
        w,
        h,
    )
    .unwrap()
}

fn seeded_person() -> Person {
    let mut p = Person::new();
    p.update(GrayFrame::filled(15, 10, 10));
    p.update(GrayFrame::filled(230, 10, 10));
    p
}

fn config() -> PipelineConfig {
    PipelineConfig {
        min_area: 200,
        interperson_period: 3,
        ..PipelineConfig::default()
    }
}

fn pipeline<B: guise_core::backend::Backend>(
    detections: Vec<Vec<Rect>>,
    backend: B,
) -> ReplacementPipeline<SidecarDetector, HistogramRecognizer, B> {
    let previous = seeded_person();
    let mut recognizer = HistogramRecognizer::new();
    previous.train(&mut recognizer).unwrap();
    ReplacementPipeline::new(
        SidecarDetector::new(detections),
        recognizer,
        backend,
        previous,
        config(),
    )
}

#[test]
fn test_host_and_parallel_pipelines_agree() {
    // Same detections, same frames, different backends: the composed
    // output must be byte-identical frame by frame.
    let rect = Rect::new(12, 12, 30, 30);
    let detections = vec![vec![rect], vec![rect], vec![Rect::new(14, 14, 30, 30)]];

    let mut host = pipeline(detections.clone(), HostBackend);
    let mut parallel = pipeline(detections, ParallelBackend);

    for i in 0..3u8 {
        let frame = textured_rgb(i * 40, 64, 64);
        let a = host.process_frame(&frame).unwrap();
        let b = parallel.process_frame(&frame).unwrap();
        assert_eq!(a, b, "frame {i} diverged between backends");
    }
}

#[test]
fn test_detection_past_frame_edge_degrades_gracefully() {
    // A 40x40 detection at (40, 40) spills past the 64x64 frame; the
    // frame must still come back composed, never an error.
    let rect = Rect::new(40, 40, 40, 40);
    let mut p = pipeline(vec![vec![rect], vec![rect]], HostBackend);
    for i in 0..2u8 {
        let out = p.process_frame(&textured_rgb(i * 50, 64, 64)).unwrap();
        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 64);
    }
}

struct VecSource {
    frames: std::vec::IntoIter<RgbFrame>,
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> std::io::Result<Option<RgbFrame>> {
        Ok(self.frames.next())
    }
}

struct CollectSink {
    frames: Vec<GrayFrame>,
}

impl FrameSink for CollectSink {
    fn write_frame(&mut self, frame: &GrayFrame) -> std::io::Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

#[test]
fn test_run_processes_every_frame_then_fails_on_exhaustion() {
    let rect = Rect::new(10, 10, 30, 30);
    let mut p = pipeline(vec![vec![rect], vec![rect], vec![rect]], HostBackend);

    let mut source = VecSource {
        frames: (0..3u8).map(|i| textured_rgb(i * 30, 64, 64)).collect::<Vec<_>>().into_iter(),
    };
    let mut sink = CollectSink { frames: Vec::new() };

    let err = p.run(&mut source, &mut sink, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, PipelineError::SourceStopped));
    assert_eq!(sink.frames.len(), 3);
    assert_eq!(sink.frames[0].width(), 64);
    assert_eq!(sink.frames[0].height(), 64);
}

#[test]
fn test_cancellation_mid_stream_stops_before_next_frame() {
    // The token is polled before each acquisition; cancelling after the
    // first write stops the loop with a clean exit and exactly one frame
    // in the sink.
    struct CancellingSink<'a> {
        inner: CollectSink,
        token: &'a CancelToken,
    }
    impl FrameSink for CancellingSink<'_> {
        fn write_frame(&mut self, frame: &GrayFrame) -> std::io::Result<()> {
            self.token.cancel();
            self.inner.write_frame(frame)
        }
    }

    let mut p = pipeline(vec![], HostBackend);
    let mut source = VecSource {
        frames: (0..10).map(|_| textured_rgb(0, 32, 32)).collect::<Vec<_>>().into_iter(),
    };
    let cancel = CancelToken::new();
    let mut sink = CancellingSink {
        inner: CollectSink { frames: Vec::new() },
        token: &cancel,
    };

    let exit = p.run(&mut source, &mut sink, &cancel).unwrap();
    assert_eq!(exit, guise_core::pipeline::LoopExit::Cancelled);
    assert_eq!(sink.inner.frames.len(), 1);
}
