//! Bounded identity buffer: recent face samples plus recognizer labels.

use std::path::Path;

use thiserror::Error;

use crate::frame::{FrameError, GrayFrame};
use crate::geometry::Rect;
use crate::recog::{FaceRecognizer, RecogError};

/// Maximum number of retained samples. Insertion beyond this evicts the
/// oldest entry from both the sample and the label sequence.
pub const CAPACITY: usize = 15;

#[derive(Debug, Error)]
pub enum PersonError {
    #[error("seed face {path}: {source}")]
    SeedLoad {
        path: String,
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Recognizer(#[from] RecogError),
}

/// Sliding-window store of one tracked subject's recent face samples.
///
/// At most two instances exist at a time: the "current" one accumulating
/// samples and the frozen "previous" one used for replacement lookups.
/// Ownership transfers from current to previous at an identity switch.
///
/// Invariant after every mutation: `labels.len() == faces.len()`, labels
/// strictly ascending, each label either 0 or its predecessor plus one.
#[derive(Debug, Clone, Default)]
pub struct Person {
    faces: Vec<GrayFrame>,
    labels: Vec<i32>,
}

impl Person {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a Person from a fixed-count directory of numbered grayscale
    /// images (`1.pgm` .. `{count}.pgm`), each resized to the canonical
    /// `width` x `height`.
    pub fn load_seed(
        dir: &Path,
        count: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, PersonError> {
        let mut person = Person::new();
        for i in 1..=count {
            let path = dir.join(format!("{i}.pgm"));
            let img = image::open(&path)
                .map_err(|source| PersonError::SeedLoad {
                    path: path.display().to_string(),
                    source,
                })?
                .into_luma8();
            let frame = GrayFrame::from_raw(
                img.as_raw().clone(),
                img.width() as usize,
                img.height() as usize,
            )?;
            person.update(frame.resize(width, height));
        }
        tracing::info!(count, width, height, dir = %dir.display(), "seed faces loaded");
        Ok(person)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[GrayFrame] {
        &self.faces
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// The resolution every sample in this buffer is stored at, fixed by
    /// the first sample.
    pub fn canonical_size(&self) -> Option<(usize, usize)> {
        self.faces.first().map(|f| (f.width(), f.height()))
    }

    /// Append a sample, assigning the next sequential label. Samples are
    /// normalized to the buffer's canonical resolution; once the capacity
    /// is exceeded the oldest sample/label pair is evicted (FIFO).
    pub fn update(&mut self, sample: GrayFrame) {
        let sample = match self.canonical_size() {
            Some((w, h)) if (sample.width(), sample.height()) != (w, h) => sample.resize(w, h),
            _ => sample,
        };

        let next_label = self.labels.last().map_or(0, |l| l + 1);
        self.faces.push(sample);
        self.labels.push(next_label);

        if self.faces.len() > CAPACITY {
            self.faces.remove(0);
            self.labels.remove(0);
        }

        debug_assert_eq!(self.faces.len(), self.labels.len());
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        self.faces.clear();
        self.labels.clear();
    }

    /// Train the recognizer on the full sample/label sequence in index
    /// order. Called whenever a frozen Person becomes the active lookup
    /// target.
    pub fn train(&self, model: &mut dyn FaceRecognizer) -> Result<(), RecogError> {
        model.train(&self.faces, &self.labels)
    }

    /// Look up the best replacement sample for a detected face.
    ///
    /// Crops the detection, resizes it to this buffer's canonical
    /// resolution, predicts a label, and maps that label back to a
    /// position in *this* buffer. Returns `None` when the buffer is empty
    /// or the predicted label is no longer present (it may have been
    /// evicted since training).
    pub fn replacement(
        &self,
        gray: &GrayFrame,
        face: &Rect,
        model: &mut dyn FaceRecognizer,
    ) -> Result<Option<&GrayFrame>, PersonError> {
        let Some((w, h)) = self.canonical_size() else {
            return Ok(None);
        };

        let probe = gray.crop(face)?.resize(w, h);
        let label = model.predict(&probe)?;

        let position = self.labels.iter().position(|&l| l == label);
        if position.is_none() {
            tracing::warn!(label, "predicted label not present in frozen buffer");
        }
        Ok(position.map(|i| &self.faces[i]))
    }
}
