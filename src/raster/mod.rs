//! The raster source capability: the only seam through which this crate
//! talks to an external georeferenced raster backend. Implementations are
//! thread-confined. The controller opens one handle per worker and never
//! shares a handle across threads.

pub mod synthetic;

#[cfg(feature = "gdal-backend")]
pub mod gdal_source;

use crate::errors::Result;
use crate::pixel::{CoverageStatus, PixelType};

/// A single open raster handle. Not assumed `Sync`; each worker owns one.
pub trait RasterSource: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn band_count(&self) -> usize;

    /// Classify the coverage of a pixel rectangle without reading it.
    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> CoverageStatus;

    /// Fill `out` with `bands` interleaved per-pixel, in the order given.
    /// `out` must be exactly `word_size(dtype) * bands.len() * w * h` bytes.
    fn read_window(
        &mut self,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        dtype: PixelType,
        bands: &[u32],
        out: &mut [u8],
    ) -> Result<()>;
}

/// Opens independent `RasterSource` handles against the same underlying
/// path. One opener is shared (read-only) across all workers; each worker
/// calls `open` once at startup to get its own thread-confined handle.
pub trait RasterSourceOpener: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn RasterSource>>;
}
