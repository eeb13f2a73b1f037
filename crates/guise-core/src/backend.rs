//! Execution backends for the mask and compose kernels.
//!
//! Both the radial mask and the over operator are per-pixel maps with no
//! cross-pixel dependency, so the same kernels can run as a serial row
//! loop or as a data-parallel map. The two backends are required to
//! produce byte-identical output; that parity is covered by the
//! integration tests.

use rayon::prelude::*;

use crate::compose::compose_row;
use crate::frame::{AlphaFrame, ALPHA_CHANNELS};
use crate::mask::{mask_row, RadiusPair, RampDirection};

/// Strategy seam for executing the per-pixel kernels.
pub trait Backend: Send + Sync {
    /// Write ramp alphas into `img`'s alpha channel, in place.
    fn apply_mask(&self, img: &mut AlphaFrame, radii: RadiusPair, direction: RampDirection);

    /// Composite `fg` over `bg` into `out`. All three frames must share
    /// dimensions; inputs are read-only and only `out` is written.
    fn compose(&self, fg: &AlphaFrame, bg: &AlphaFrame, out: &mut AlphaFrame);
}

/// Serial host-memory execution: one row at a time.
pub struct HostBackend;

impl Backend for HostBackend {
    fn apply_mask(&self, img: &mut AlphaFrame, radii: RadiusPair, direction: RampDirection) {
        let rows = img.height();
        let cols = img.width();
        for (row, pixels) in img.rows_mut().enumerate() {
            mask_row(pixels, row, rows, cols, radii, direction);
        }
    }

    fn compose(&self, fg: &AlphaFrame, bg: &AlphaFrame, out: &mut AlphaFrame) {
        debug_assert_eq!(fg.width(), bg.width());
        debug_assert_eq!(fg.height(), bg.height());
        for row in 0..out.height() {
            compose_row(fg.row(row), bg.row(row), out.row_mut(row));
        }
    }
}

/// Staging buffer on the data-parallel side of an explicit transfer
/// boundary. Kernels only touch a `DeviceFrame` between an upload and a
/// download, mirroring how an accelerator path would stage host images.
struct DeviceFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl DeviceFrame {
    fn upload(img: &AlphaFrame) -> Self {
        Self {
            data: img.data().to_vec(),
            width: img.width(),
            height: img.height(),
        }
    }

    fn download(self) -> AlphaFrame {
        // Length is preserved by construction.
        AlphaFrame::from_raw(self.data, self.width, self.height)
            .unwrap_or_else(|_| AlphaFrame::zeroed(0, 0))
    }

    fn stride(&self) -> usize {
        self.width * ALPHA_CHANNELS
    }
}

/// Data-parallel execution: every row is processed independently on the
/// rayon pool, with no ordering guarantee across rows and no shared
/// mutable state between pixels.
pub struct ParallelBackend;

impl Backend for ParallelBackend {
    fn apply_mask(&self, img: &mut AlphaFrame, radii: RadiusPair, direction: RampDirection) {
        let mut dev = DeviceFrame::upload(img);
        let (rows, cols, stride) = (dev.height, dev.width, dev.stride());

        dev.data
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(row, pixels)| mask_row(pixels, row, rows, cols, radii, direction));

        *img = dev.download();
    }

    fn compose(&self, fg: &AlphaFrame, bg: &AlphaFrame, out: &mut AlphaFrame) {
        debug_assert_eq!(fg.width(), bg.width());
        debug_assert_eq!(fg.height(), bg.height());

        let fg_dev = DeviceFrame::upload(fg);
        let bg_dev = DeviceFrame::upload(bg);
        let mut out_dev = DeviceFrame::upload(out);
        let stride = out_dev.stride();

        out_dev
            .data
            .par_chunks_exact_mut(stride)
            .zip(fg_dev.data.par_chunks_exact(stride))
            .zip(bg_dev.data.par_chunks_exact(stride))
            .for_each(|((out_row, fg_row), bg_row)| compose_row(fg_row, bg_row, out_row));

        *out = out_dev.download();
    }
}
