//! Pixel buffers and raw-buffer image primitives.
//!
//! All in-core pixel work happens on plain `Vec<u8>` buffers; the `image`
//! crate is only used at the I/O edges. Resizing uses bilinear
//! interpolation for sub-pixel accuracy.

use thiserror::Error;

use crate::geometry::Rect;

/// Number of interleaved channels in an [`AlphaFrame`] (gray replicated to
/// three color channels plus alpha).
pub const ALPHA_CHANNELS: usize = 4;

/// Offset of the alpha byte within one [`AlphaFrame`] pixel.
pub const ALPHA_OFFSET: usize = 3;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("buffer length {actual} does not match {width}x{height} ({expected} expected)")]
    InvalidLength {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("crop {rect:?} exceeds frame bounds {width}x{height}")]
    CropOutOfBounds {
        rect: Rect,
        width: usize,
        height: usize,
    },
}

/// A single-channel grayscale image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayFrame {
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Result<Self, FrameError> {
        if data.len() != width * height {
            return Err(FrameError::InvalidLength {
                width,
                height,
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// A frame filled with a constant gray level.
    pub fn filled(level: u8, width: usize, height: usize) -> Self {
        Self {
            data: vec![level; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    /// Extract a sub-image. The rectangle must lie fully inside the frame.
    pub fn crop(&self, rect: &Rect) -> Result<GrayFrame, FrameError> {
        let x = rect.x.max(0) as usize;
        let y = rect.y.max(0) as usize;
        let w = rect.width as usize;
        let h = rect.height as usize;

        if rect.x < 0 || rect.y < 0 || x + w > self.width || y + h > self.height {
            return Err(FrameError::CropOutOfBounds {
                rect: *rect,
                width: self.width,
                height: self.height,
            });
        }

        let mut data = Vec::with_capacity(w * h);
        for row in y..y + h {
            let start = row * self.width + x;
            data.extend_from_slice(&self.data[start..start + w]);
        }
        Ok(GrayFrame { data, width: w, height: h })
    }

    /// Write a sub-image back at `rect`'s position. Dimensions must match.
    pub fn paste(&mut self, rect: &Rect, patch: &GrayFrame) -> Result<(), FrameError> {
        if rect.width as usize != patch.width || rect.height as usize != patch.height {
            return Err(FrameError::InvalidLength {
                width: rect.width as usize,
                height: rect.height as usize,
                expected: rect.area() as usize,
                actual: patch.data.len(),
            });
        }
        let x = rect.x.max(0) as usize;
        let y = rect.y.max(0) as usize;
        if x + patch.width > self.width || y + patch.height > self.height {
            return Err(FrameError::CropOutOfBounds {
                rect: *rect,
                width: self.width,
                height: self.height,
            });
        }
        for row in 0..patch.height {
            let dst = (y + row) * self.width + x;
            let src = row * patch.width;
            self.data[dst..dst + patch.width]
                .copy_from_slice(&patch.data[src..src + patch.width]);
        }
        Ok(())
    }

    /// Resize with bilinear interpolation (half-pixel-center sampling).
    pub fn resize(&self, new_width: usize, new_height: usize) -> GrayFrame {
        if new_width == 0 || new_height == 0 {
            return GrayFrame { data: Vec::new(), width: new_width, height: new_height };
        }
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let scale_x = self.width as f32 / new_width as f32;
        let scale_y = self.height as f32 / new_height as f32;

        let mut data = vec![0u8; new_width * new_height];
        for y in 0..new_height {
            let src_y = (y as f32 + 0.5) * scale_y - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, self.height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(self.height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_width {
                let src_x = (x as f32 + 0.5) * scale_x - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, self.width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(self.width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                let tl = self.pixel(y0, x0) as f32;
                let tr = self.pixel(y0, x1) as f32;
                let bl = self.pixel(y1, x0) as f32;
                let br = self.pixel(y1, x1) as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                data[y * new_width + x] = val.round().clamp(0.0, 255.0) as u8;
            }
        }

        GrayFrame { data, width: new_width, height: new_height }
    }

    /// Expand to a 4-channel frame: gray replicated, alpha fully opaque.
    pub fn to_alpha(&self) -> AlphaFrame {
        let mut data = Vec::with_capacity(self.data.len() * ALPHA_CHANNELS);
        for &g in &self.data {
            data.extend_from_slice(&[g, g, g, 255]);
        }
        AlphaFrame { data, width: self.width, height: self.height }
    }

    /// 256-bin intensity histogram.
    pub fn histogram(&self) -> [f64; 256] {
        let mut hist = [0f64; 256];
        for &p in &self.data {
            hist[p as usize] += 1.0;
        }
        hist
    }

    /// Separable Gaussian blur with an odd kernel size and the conventional
    /// derived sigma (`0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`). Edge pixels
    /// are handled by clamping.
    pub fn gaussian_blur(&self, ksize: usize) -> GrayFrame {
        debug_assert!(ksize % 2 == 1, "kernel size must be odd");
        if self.data.is_empty() || ksize <= 1 {
            return self.clone();
        }

        let sigma = 0.3 * ((ksize - 1) as f64 * 0.5 - 1.0) + 0.8;
        let kernel = gaussian_kernel(ksize, sigma);
        let half = ksize / 2;

        // Horizontal pass
        let mut tmp = vec![0f64; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - half as i64)
                        .clamp(0, self.width as i64 - 1) as usize;
                    acc += w * self.pixel(y, sx) as f64;
                }
                tmp[y * self.width + x] = acc;
            }
        }

        // Vertical pass
        let mut data = vec![0u8; self.data.len()];
        for y in 0..self.height {
            for x in 0..self.width {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y as i64 + k as i64 - half as i64)
                        .clamp(0, self.height as i64 - 1) as usize;
                    acc += w * tmp[sy * self.width + x];
                }
                data[y * self.width + x] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }

        GrayFrame { data, width: self.width, height: self.height }
    }
}

fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f64> {
    let half = ksize as f64 / 2.0 - 0.5;
    let mut kernel: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - half;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

/// An interleaved RGB color frame, as delivered by a frame source.
#[derive(Debug, Clone)]
pub struct RgbFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl RgbFrame {
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Result<Self, FrameError> {
        if data.len() != width * height * 3 {
            return Err(FrameError::InvalidLength {
                width,
                height,
                expected: width * height * 3,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grayscale conversion with BT.601 luma weights.
    pub fn to_gray(&self) -> GrayFrame {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayFrame { data, width: self.width, height: self.height }
    }
}

/// A 4-channel (color + alpha) frame with strided row access.
///
/// Both execution backends operate on this representation; each pixel is
/// `[c, c, c, alpha]` with the gray level replicated across the color
/// channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl AlphaFrame {
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Result<Self, FrameError> {
        if data.len() != width * height * ALPHA_CHANNELS {
            return Err(FrameError::InvalidLength {
                width,
                height,
                expected: width * height * ALPHA_CHANNELS,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// A fully transparent black frame of the given dimensions.
    pub fn zeroed(width: usize, height: usize) -> Self {
        Self {
            data: vec![0u8; width * height * ALPHA_CHANNELS],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width * ALPHA_CHANNELS
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[row * stride..(row + 1) * stride]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.data[row * stride..(row + 1) * stride]
    }

    /// Mutable view of all rows at once, for data-parallel scheduling.
    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        let stride = self.stride();
        self.data.chunks_exact_mut(stride)
    }

    pub fn alpha(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.stride() + col * ALPHA_CHANNELS + ALPHA_OFFSET]
    }

    /// Collapse back to grayscale by taking the first color channel.
    ///
    /// The color channels are replicated gray, so no weighting is needed.
    pub fn to_gray(&self) -> GrayFrame {
        let data = self
            .data
            .chunks_exact(ALPHA_CHANNELS)
            .map(|px| px[0])
            .collect();
        GrayFrame { data, width: self.width, height: self.height }
    }
}
