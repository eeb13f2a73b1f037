//! Radial alpha ramps.
//!
//! An alpha ramp maps normalized radial distance from the image center to
//! an opacity in [0, 255]. The forward ramp fades the replacement face out
//! toward its edges; the reverse ramp fades the destination region in, so
//! that in dual-ramp mode the two always sum to full opacity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("invalid radius pair ({r0}, {rf}): require 0 <= r0 < rf")]
    InvalidRadiusPair { r0: f64, rf: f64 },
}

/// Inner and outer ramp radii, as fractions of the center-to-corner
/// distance. The ramp is fully opaque below `r0` and fully transparent at
/// and beyond `rf`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusPair {
    r0: f64,
    rf: f64,
}

impl RadiusPair {
    /// Radii calibrated against the dual-ramp blending mode.
    pub const CALIBRATED: RadiusPair = RadiusPair { r0: 0.7, rf: 0.9 };

    pub fn new(r0: f64, rf: f64) -> Result<Self, MaskError> {
        if r0 < 0.0 || r0 >= rf || !rf.is_finite() {
            return Err(MaskError::InvalidRadiusPair { r0, rf });
        }
        Ok(Self { r0, rf })
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn rf(&self) -> f64 {
        self.rf
    }
}

impl Default for RadiusPair {
    fn default() -> Self {
        Self::CALIBRATED
    }
}

/// Named blending strategies.
///
/// `Dual` applies the forward ramp to the replacement face and the reverse
/// ramp to the destination, so opacity sums to 255 at every distance.
/// `ForwardOnly` is the legacy circular vignette: only the replacement face
/// is ramped and the destination keeps full opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampMode {
    #[default]
    Dual,
    ForwardOnly,
}

/// Which ramp direction to write into a buffer's alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDirection {
    Forward,
    Reverse,
}

/// Euclidean distance of `(row, col)` from the image center, normalized by
/// the maximum distance in the image (center to corner).
///
/// Defined as 0.0 when the maximum distance is itself 0 (a 1x1 image), so
/// degenerate geometry never divides by zero.
pub fn radial_ratio(row: usize, col: usize, rows: usize, cols: usize) -> f64 {
    if rows <= 1 && cols <= 1 {
        return 0.0;
    }
    let max = center_distance(0.0, 0.0, rows, cols);
    if max == 0.0 {
        return 0.0;
    }
    center_distance(row as f64, col as f64, rows, cols) / max
}

fn center_distance(row: f64, col: f64, rows: usize, cols: usize) -> f64 {
    let dr = row - rows as f64 / 2.0;
    let dc = col - cols as f64 / 2.0;
    (dr * dr + dc * dc).sqrt()
}

/// Forward ramp: 255 below `r0`, linear 255 -> 0 over `[r0, rf)`, 0 at and
/// beyond `rf`.
pub fn forward_alpha(ratio: f64, radii: RadiusPair) -> u8 {
    if ratio < radii.r0 {
        255
    } else if ratio >= radii.rf {
        0
    } else {
        let t = (radii.rf - ratio) / (radii.rf - radii.r0);
        (255.0 * t).round() as u8
    }
}

/// Reverse ramp: the complement of the forward ramp at every distance.
pub fn reverse_alpha(ratio: f64, radii: RadiusPair) -> u8 {
    255 - forward_alpha(ratio, radii)
}

/// Per-row mask kernel: writes ramp alphas into one row of a 4-channel
/// buffer. Shared verbatim by both execution backends — each pixel depends
/// only on its own coordinates.
pub fn mask_row(
    row_pixels: &mut [u8],
    row: usize,
    rows: usize,
    cols: usize,
    radii: RadiusPair,
    direction: RampDirection,
) {
    use crate::frame::{ALPHA_CHANNELS, ALPHA_OFFSET};
    for (col, px) in row_pixels.chunks_exact_mut(ALPHA_CHANNELS).enumerate() {
        let ratio = radial_ratio(row, col, rows, cols);
        px[ALPHA_OFFSET] = match direction {
            RampDirection::Forward => forward_alpha(ratio, radii),
            RampDirection::Reverse => reverse_alpha(ratio, radii),
        };
    }
}
