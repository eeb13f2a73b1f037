use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use guise_core::backend::{Backend, HostBackend, ParallelBackend};
use guise_core::detect::{FaceDetector, SidecarDetector};
use guise_core::mask::RampMode;
use guise_search::{
    best_candidate, build_corpus, run_search, FullFrameDetector, SearchGrid, EXTRACT_MIN_AREA,
};

/// Find the optimal radial alpha filter for face blending.
#[derive(Parser)]
#[command(name = "guise-psearch")]
struct Args {
    /// Directory of corpus images (pre-cropped faces unless --detections
    /// is given)
    #[arg(long, default_value = "psearch_images")]
    images: PathBuf,

    /// Optional JSON sidecar of per-image detection rectangles
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Starting value of r0
    #[arg(long = "r00", default_value_t = 0.6)]
    r0_start: f64,

    /// Final value of r0
    #[arg(long = "r0f", default_value_t = 1.0)]
    r0_end: f64,

    /// Starting value of rf
    #[arg(long = "rf0", default_value_t = 0.8)]
    rf_start: f64,

    /// Final value of rf
    #[arg(long = "rff", default_value_t = 1.0)]
    rf_end: f64,

    /// Step size for r0
    #[arg(long, default_value_t = 0.05)]
    delta_r0: f64,

    /// Step size for rf
    #[arg(long, default_value_t = 0.05)]
    delta_rf: f64,

    /// Score the legacy single-ramp vignette instead of the dual ramp
    #[arg(long)]
    legacy_vignette: bool,

    /// Run on the serial host backend instead of the parallel one
    #[arg(long)]
    cpu: bool,

    /// Weight of the stddev penalty in the automatic pick
    #[arg(long, default_value_t = 1.0)]
    spread_penalty: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.delta_r0 <= 0.0 || args.delta_rf <= 0.0 {
        bail!(
            "step sizes must be positive (got delta_r0 = {}, delta_rf = {})",
            args.delta_r0,
            args.delta_rf
        );
    }

    let mut detector: Box<dyn FaceDetector> = match &args.detections {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            Box::new(SidecarDetector::from_reader(file)?)
        }
        None => Box::new(FullFrameDetector),
    };

    let corpus = build_corpus(&args.images, detector.as_mut(), EXTRACT_MIN_AREA)?;
    if corpus.is_empty() {
        bail!("no usable faces in {}", args.images.display());
    }

    let grid = SearchGrid {
        r0_start: args.r0_start,
        r0_end: args.r0_end,
        rf_start: args.rf_start,
        rf_end: args.rf_end,
        delta_r0: args.delta_r0,
        delta_rf: args.delta_rf,
    };
    let mode = if args.legacy_vignette {
        RampMode::ForwardOnly
    } else {
        RampMode::Dual
    };
    let backend: Box<dyn Backend> = if args.cpu {
        Box::new(HostBackend)
    } else {
        Box::new(ParallelBackend)
    };

    let results = run_search(&corpus, &grid, mode, backend.as_ref());
    for (radii, stat) in &results {
        println!("{}, {}, {}, {}", radii.r0(), radii.rf(), stat.mean, stat.std_dev);
    }

    if let Some(best) = best_candidate(&results, args.spread_penalty) {
        println!("best: r0 = {}, rf = {}", best.r0(), best.rf());
    }

    Ok(())
}
