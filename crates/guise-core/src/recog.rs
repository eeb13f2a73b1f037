//! Face recognizer seam and a histogram-correlation implementation.

use thiserror::Error;

use crate::frame::GrayFrame;
use crate::hist;

#[derive(Debug, Error)]
pub enum RecogError {
    #[error("training set mismatch: {samples} samples vs {labels} labels")]
    TrainMismatch { samples: usize, labels: usize },
    #[error("empty training set")]
    EmptyTrainingSet,
    #[error("recognizer has not been trained")]
    NotTrained,
}

/// Strategy for training on labeled face samples and predicting the label
/// of a probe sample.
///
/// Contract: `train` is always called with equally long sample and label
/// sequences, and a successful `predict` returns one of the labels from
/// the most recent `train` call.
pub trait FaceRecognizer {
    fn train(&mut self, samples: &[GrayFrame], labels: &[i32]) -> Result<(), RecogError>;
    fn predict(&mut self, sample: &GrayFrame) -> Result<i32, RecogError>;
}

/// Recognizer backed by intensity-histogram correlation.
///
/// Training stores one histogram per sample; prediction traverses the
/// whole gallery (no early exit) and returns the label of the highest
/// correlation.
#[derive(Default)]
pub struct HistogramRecognizer {
    gallery: Vec<(i32, [f64; 256])>,
}

impl HistogramRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FaceRecognizer for HistogramRecognizer {
    fn train(&mut self, samples: &[GrayFrame], labels: &[i32]) -> Result<(), RecogError> {
        if samples.len() != labels.len() {
            return Err(RecogError::TrainMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        if samples.is_empty() {
            return Err(RecogError::EmptyTrainingSet);
        }

        self.gallery = samples
            .iter()
            .zip(labels.iter())
            .map(|(s, &l)| (l, s.histogram()))
            .collect();

        tracing::debug!(gallery = self.gallery.len(), "recognizer trained");
        Ok(())
    }

    fn predict(&mut self, sample: &GrayFrame) -> Result<i32, RecogError> {
        if self.gallery.is_empty() {
            return Err(RecogError::NotTrained);
        }

        let probe = sample.histogram();
        let mut best_label = self.gallery[0].0;
        let mut best_score = f64::NEG_INFINITY;

        // Always traverse the full gallery; no early exit.
        for (label, h) in &self.gallery {
            let score = hist::correlation(&probe, h);
            if score > best_score {
                best_score = score;
                best_label = *label;
            }
        }

        Ok(best_label)
    }
}
