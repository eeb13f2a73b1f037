//! guise-search — Offline grid search over the radial filter radii.
//!
//! Scores every candidate (r0, rf) pair by blending all ordered pairs of
//! corpus faces and measuring how well the blend's histogram correlates
//! with both source histograms. The printed mean/stddev surface is meant
//! for manual inspection; [`best_candidate`] offers an automatic pick.

pub mod stats;

use std::path::{Path, PathBuf};

use thiserror::Error;

use guise_core::backend::Backend;
use guise_core::compose;
use guise_core::detect::{best_detection, FaceDetector};
use guise_core::frame::GrayFrame;
use guise_core::geometry::Rect;
use guise_core::hist;
use guise_core::mask::{RadiusPair, RampMode};

/// Minimum face area, in pixels, for corpus extraction.
pub const EXTRACT_MIN_AREA: u64 = 16;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no face found in {path}")]
    NoFaceFound { path: PathBuf },
    #[error("corpus directory {path}: {source}")]
    CorpusDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corpus image {path}: {source}")]
    CorpusImage {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] guise_core::frame::FrameError),
}

/// Pre-extracted face crops with their precomputed histograms.
pub struct Corpus {
    faces: Vec<GrayFrame>,
    hists: Vec<[f64; 256]>,
}

impl Corpus {
    pub fn new(faces: Vec<GrayFrame>) -> Self {
        let hists = faces.iter().map(GrayFrame::histogram).collect();
        Self { faces, hists }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Detector that treats the whole image as the face, for corpora of
/// already-cropped faces.
pub struct FullFrameDetector;

impl FaceDetector for FullFrameDetector {
    fn detect(&mut self, frame: &GrayFrame) -> Vec<Rect> {
        vec![Rect::new(0, 0, frame.width() as u32, frame.height() as u32)]
    }
}

/// Decode every image file in a directory as grayscale, in sorted order.
/// A file that fails to decode is skipped with a warning; it never aborts
/// the scan.
pub fn load_images(dir: &Path) -> Result<Vec<(PathBuf, GrayFrame)>, SearchError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SearchError::CorpusDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("jpg" | "jpeg" | "png" | "pgm")
            )
        })
        .collect();
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        match image::open(&path) {
            Ok(img) => {
                let luma = img.into_luma8();
                let frame = GrayFrame::from_raw(
                    luma.as_raw().clone(),
                    luma.width() as usize,
                    luma.height() as usize,
                )?;
                images.push((path, frame));
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping undecodable image");
            }
        }
    }
    Ok(images)
}

/// Extract the largest qualifying face crop from a static image.
///
/// "No face found" is a hard failure for this single image only; batch
/// callers skip it and continue the corpus scan.
pub fn extract_face(
    path: &Path,
    image: &GrayFrame,
    detector: &mut dyn FaceDetector,
    min_area: u64,
) -> Result<GrayFrame, SearchError> {
    let face = best_detection(detector, image, min_area).ok_or_else(|| {
        SearchError::NoFaceFound {
            path: path.to_path_buf(),
        }
    })?;
    Ok(image.crop(&face)?)
}

/// Build a corpus from a directory: decode, extract, histogram. Per-image
/// failures are logged and skipped.
pub fn build_corpus(
    dir: &Path,
    detector: &mut dyn FaceDetector,
    min_area: u64,
) -> Result<Corpus, SearchError> {
    let images = load_images(dir)?;
    let mut faces = Vec::new();
    for (path, image) in &images {
        match extract_face(path, image, detector, min_area) {
            Ok(face) => faces.push(face),
            Err(err) => {
                tracing::warn!(error = %err, "skipping corpus image");
            }
        }
    }
    tracing::info!(faces = faces.len(), total = images.len(), "corpus built");
    Ok(Corpus::new(faces))
}

/// Aggregate correlation score for one radius pair over a corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistic {
    pub mean: f64,
    pub std_dev: f64,
}

/// Score one (r0, rf) candidate.
///
/// For every ordered pair (i, j) of corpus faces, including i == j, the
/// j-th face is resized to the i-th face's dimensions and blended over
/// it; the accumulated score per pair is
/// `correlation(hist_i, hist_blend) + correlation(hist_j, hist_blend)`.
pub fn find_statistic(
    corpus: &Corpus,
    radii: RadiusPair,
    mode: RampMode,
    backend: &dyn Backend,
) -> Statistic {
    let mut scores = Vec::with_capacity(corpus.len() * corpus.len());

    for (host, host_hist) in corpus.faces.iter().zip(&corpus.hists) {
        for (repl, repl_hist) in corpus.faces.iter().zip(&corpus.hists) {
            let scaled = repl.resize(host.width(), host.height());
            let blended = compose::blend(host, &scaled, radii, mode, backend);
            let blend_hist = blended.histogram();
            scores.push(
                hist::correlation(host_hist, &blend_hist)
                    + hist::correlation(repl_hist, &blend_hist),
            );
        }
    }

    Statistic {
        mean: stats::mean(&scores),
        std_dev: stats::std_dev(&scores),
    }
}

/// Inclusive 2-D grid over the radius-pair space.
#[derive(Debug, Clone, Copy)]
pub struct SearchGrid {
    pub r0_start: f64,
    pub r0_end: f64,
    pub rf_start: f64,
    pub rf_end: f64,
    pub delta_r0: f64,
    pub delta_rf: f64,
}

impl SearchGrid {
    /// All valid candidate pairs on the grid. Combinations with
    /// `r0 >= rf` are silently skipped — the ramp would be degenerate.
    /// Step sizes must be positive and finite; anything else yields an
    /// empty grid instead of a runaway iteration.
    pub fn candidates(&self) -> Vec<RadiusPair> {
        const EPS: f64 = 1e-9;
        if !(self.delta_r0 > 0.0 && self.delta_rf > 0.0)
            || !self.delta_r0.is_finite()
            || !self.delta_rf.is_finite()
        {
            return Vec::new();
        }
        let mut pairs = Vec::new();
        let mut r0 = self.r0_start;
        while r0 <= self.r0_end + EPS {
            let mut rf = self.rf_start;
            while rf <= self.rf_end + EPS {
                if let Ok(pair) = RadiusPair::new(r0, rf) {
                    pairs.push(pair);
                }
                rf += self.delta_rf;
            }
            r0 += self.delta_r0;
        }
        pairs
    }
}

/// Score every candidate on the grid, in grid order.
pub fn run_search(
    corpus: &Corpus,
    grid: &SearchGrid,
    mode: RampMode,
    backend: &dyn Backend,
) -> Vec<(RadiusPair, Statistic)> {
    grid.candidates()
        .into_iter()
        .map(|radii| {
            let stat = find_statistic(corpus, radii, mode, backend);
            tracing::debug!(
                r0 = radii.r0(),
                rf = radii.rf(),
                mean = stat.mean,
                std_dev = stat.std_dev,
                "candidate scored"
            );
            (radii, stat)
        })
        .collect()
}

/// Automatic pick: the candidate maximizing `mean - k * std_dev`.
pub fn best_candidate(results: &[(RadiusPair, Statistic)], k: f64) -> Option<RadiusPair> {
    results
        .iter()
        .max_by(|(_, a), (_, b)| {
            let sa = a.mean - k * a.std_dev;
            let sb = b.mean - k * b.std_dev;
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(radii, _)| *radii)
}
