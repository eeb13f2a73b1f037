use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use guise_core::backend::{HostBackend, ParallelBackend};
use guise_core::detect::SidecarDetector;
use guise_core::mask::{RadiusPair, RampMode};
use guise_core::pipeline::{
    min_area_for, CancelToken, PipelineConfig, ReplacementPipeline, DEFAULT_INTERPERSON_PERIOD,
};
use guise_core::person::Person;
use guise_core::recog::HistogramRecognizer;

mod io;

/// Face detection and replacement over a frame sequence.
#[derive(Parser)]
#[command(name = "guise")]
struct Args {
    /// Horizontal output resolution in pixels
    #[arg(short, long, default_value_t = 1280)]
    x_res: u64,

    /// Vertical output resolution in pixels
    #[arg(short, long, default_value_t = 720)]
    y_res: u64,

    /// Directory holding the ordered input frame sequence
    #[arg(long)]
    frames: PathBuf,

    /// JSON sidecar of per-frame detection rectangles
    #[arg(long)]
    detections: PathBuf,

    /// Directory of numbered seed faces for the first identity
    #[arg(long, default_value = "starting_faces")]
    seed_faces: PathBuf,

    /// Number of seed face files (1.pgm .. N.pgm)
    #[arg(long, default_value_t = 10)]
    seed_count: usize,

    /// Output directory for composed frames
    #[arg(long)]
    out: PathBuf,

    /// Run the blend on the serial host backend instead of the parallel one
    #[arg(short, long)]
    cpu: bool,

    /// Inner ramp radius
    #[arg(long, default_value_t = 0.7)]
    r0: f64,

    /// Outer ramp radius
    #[arg(long, default_value_t = 0.9)]
    rf: f64,

    /// Use the legacy single-ramp vignette blend
    #[arg(long)]
    legacy_vignette: bool,

    /// Frames without a confirmed match before an identity switch
    #[arg(long, default_value_t = DEFAULT_INTERPERSON_PERIOD)]
    interperson_period: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let radii = RadiusPair::new(args.r0, args.rf)
        .with_context(|| format!("bad radii ({}, {})", args.r0, args.rf))?;
    let config = PipelineConfig {
        min_area: min_area_for(args.x_res, args.y_res),
        interperson_period: args.interperson_period,
        radii,
        mode: if args.legacy_vignette {
            RampMode::ForwardOnly
        } else {
            RampMode::Dual
        },
    };

    // Seed the first frozen identity at a quarter of the output resolution.
    let previous = Person::load_seed(
        &args.seed_faces,
        args.seed_count,
        (args.x_res / 4) as usize,
        (args.y_res / 4) as usize,
    )?;
    let mut recognizer = HistogramRecognizer::new();
    previous.train(&mut recognizer)?;

    let detections = std::fs::File::open(&args.detections)
        .with_context(|| format!("opening {}", args.detections.display()))?;
    let detector = SidecarDetector::from_reader(detections)?;

    let mut source = io::ImageDirSource::open(&args.frames)?;
    let mut sink = io::PngDirSink::create(&args.out)?;

    // Ctrl-C sets the token; the loop polls it once per frame.
    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            signal_token.cancel();
        }
    });

    let exit = tokio::task::spawn_blocking(move || {
        if args.cpu {
            let mut pipeline = ReplacementPipeline::new(
                detector, recognizer, HostBackend, previous, config,
            );
            pipeline.run(&mut source, &mut sink, &cancel)
        } else {
            let mut pipeline = ReplacementPipeline::new(
                detector, recognizer, ParallelBackend, previous, config,
            );
            pipeline.run(&mut source, &mut sink, &cancel)
        }
    })
    .await??;

    tracing::info!(?exit, "frame loop finished");
    Ok(())
}
