//! Frame I/O over image directories: an ordered sequence of decoded
//! frames in, PNG frames out.

use std::io;
use std::path::{Path, PathBuf};

use guise_core::frame::{GrayFrame, RgbFrame};
use guise_core::pipeline::{FrameSink, FrameSource};

fn to_io_error(err: impl std::error::Error + Send + Sync + 'static) -> io::Error {
    io::Error::other(err)
}

/// Frame source backed by a directory of image files, consumed in sorted
/// order. Stands in for a capture device; running dry is how the source
/// "stops yielding frames".
pub struct ImageDirSource {
    paths: std::vec::IntoIter<PathBuf>,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
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
        tracing::info!(frames = paths.len(), dir = %dir.display(), "frame sequence opened");
        Ok(Self { paths: paths.into_iter() })
    }
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> io::Result<Option<RgbFrame>> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        let img = image::open(&path).map_err(to_io_error)?.into_rgb8();
        let frame = RgbFrame::from_raw(
            img.as_raw().clone(),
            img.width() as usize,
            img.height() as usize,
        )
        .map_err(to_io_error)?;
        Ok(Some(frame))
    }
}

/// Frame sink writing numbered PNG files into a directory.
pub struct PngDirSink {
    dir: PathBuf,
    next_index: u64,
}

impl PngDirSink {
    pub fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next_index: 0,
        })
    }
}

impl FrameSink for PngDirSink {
    fn write_frame(&mut self, frame: &GrayFrame) -> io::Result<()> {
        let path = self.dir.join(format!("{:06}.png", self.next_index));
        self.next_index += 1;
        image::save_buffer(
            &path,
            frame.data(),
            frame.width() as u32,
            frame.height() as u32,
            image::ColorType::L8,
        )
        .map_err(to_io_error)
    }
}
