//! Manual Porter-Duff "over" compositing.
//!
//! The operator is written out as raw channel arithmetic rather than a
//! library call so the exact same per-pixel kernel runs on both execution
//! backends. Each output pixel depends only on its own inputs.

use crate::backend::Backend;
use crate::frame::{AlphaFrame, GrayFrame, ALPHA_CHANNELS, ALPHA_OFFSET};
use crate::mask::{RadiusPair, RampDirection, RampMode};

/// One color channel of the over operator, with round-half-up integer
/// arithmetic: `out = fg * alpha/255 + bg * (1 - alpha/255)`.
#[inline]
fn over_channel(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

/// Per-row compose kernel. The output alpha is fixed to fully opaque; the
/// composite is always an opaque image even when inputs carry partial
/// alpha. The background weight is the complement of the foreground alpha,
/// which in dual-ramp mode equals the reverse ramp written into the
/// background buffer.
pub fn compose_row(fg_row: &[u8], bg_row: &[u8], out_row: &mut [u8]) {
    for ((fg, bg), out) in fg_row
        .chunks_exact(ALPHA_CHANNELS)
        .zip(bg_row.chunks_exact(ALPHA_CHANNELS))
        .zip(out_row.chunks_exact_mut(ALPHA_CHANNELS))
    {
        let alpha = fg[ALPHA_OFFSET];
        for c in 0..ALPHA_OFFSET {
            out[c] = over_channel(fg[c], bg[c], alpha);
        }
        out[ALPHA_OFFSET] = 255;
    }
}

/// Blend a replacement face over a host face of the same dimensions along
/// a circular gradient, returning the opaque grayscale composite.
///
/// Used by both the live pipeline and the offline parameter search.
pub fn blend(
    host: &GrayFrame,
    replacement: &GrayFrame,
    radii: RadiusPair,
    mode: RampMode,
    backend: &dyn Backend,
) -> GrayFrame {
    debug_assert_eq!(host.width(), replacement.width());
    debug_assert_eq!(host.height(), replacement.height());

    let mut fg = replacement.to_alpha();
    let mut bg = host.to_alpha();

    backend.apply_mask(&mut fg, radii, RampDirection::Forward);
    if mode == RampMode::Dual {
        backend.apply_mask(&mut bg, radii, RampDirection::Reverse);
    }

    let mut out = AlphaFrame::zeroed(host.width(), host.height());
    backend.compose(&fg, &bg, &mut out);
    out.to_gray()
}
