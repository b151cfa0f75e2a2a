//! An in-memory synthetic raster backend used by the test suite and the CLI
//! demo harness. It honors the same `RasterSource`/`RasterSourceOpener`
//! capability any real backend (GDAL, ...) would implement, so tests
//! exercise the exact seam the adapter contract describes.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::Result;
use crate::pixel::{CoverageStatus, PixelType};
use crate::raster::{RasterSource, RasterSourceOpener};

/// Which pixel-aligned rectangles report as having no data.
#[derive(Debug, Clone)]
pub enum NoDataPolicy {
    /// Every window is fully covered.
    AllFull,
    /// Every window reports empty (used to test the "never produces" path).
    AllEmpty,
    /// Windows whose pixel origin `(x, y)` appears in the set report empty;
    /// everything else is full.
    EmptyAt(Arc<HashSet<(usize, usize)>>),
}

#[derive(Debug, Clone)]
struct SyntheticRasterDesc {
    width: usize,
    height: usize,
    band_count: usize,
    nodata: NoDataPolicy,
}

/// Shared description of a synthetic dataset; cheap to clone per worker
/// since the backing description is reference-counted.
#[derive(Clone)]
pub struct SyntheticRasterOpener {
    desc: Arc<SyntheticRasterDesc>,
}

impl SyntheticRasterOpener {
    pub fn new(width: usize, height: usize, band_count: usize, nodata: NoDataPolicy) -> Self {
        SyntheticRasterOpener {
            desc: Arc::new(SyntheticRasterDesc {
                width,
                height,
                band_count,
                nodata,
            }),
        }
    }
}

impl RasterSourceOpener for SyntheticRasterOpener {
    fn open(&self, _path: &str) -> Result<Box<dyn RasterSource>> {
        Ok(Box::new(SyntheticRasterSource {
            desc: self.desc.clone(),
        }))
    }
}

pub struct SyntheticRasterSource {
    desc: Arc<SyntheticRasterDesc>,
}

impl RasterSource for SyntheticRasterSource {
    fn width(&self) -> usize {
        self.desc.width
    }

    fn height(&self) -> usize {
        self.desc.height
    }

    fn band_count(&self) -> usize {
        self.desc.band_count
    }

    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> CoverageStatus {
        let _ = (w, h);
        match &self.desc.nodata {
            NoDataPolicy::AllFull => CoverageStatus::Full,
            NoDataPolicy::AllEmpty => CoverageStatus::Empty,
            NoDataPolicy::EmptyAt(set) => {
                if set.contains(&(x, y)) {
                    CoverageStatus::Empty
                } else {
                    CoverageStatus::Full
                }
            }
        }
    }

    fn read_window(
        &mut self,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        dtype: PixelType,
        bands: &[u32],
        out: &mut [u8],
    ) -> Result<()> {
        let word = dtype.word_size();
        debug_assert_eq!(out.len(), word * bands.len() * w * h);

        let mut cursor = 0usize;
        for row in 0..h {
            for col in 0..w {
                let px = x + col;
                let py = y + row;
                for &band in bands {
                    write_sample(dtype, px, py, band, &mut out[cursor..cursor + word]);
                    cursor += word;
                }
            }
        }
        Ok(())
    }
}

/// Deterministic procedural fill: every pixel/band combination maps to a
/// reproducible value so tests can assert on exact bytes if they want to.
fn write_sample(dtype: PixelType, x: usize, y: usize, band: u32, dst: &mut [u8]) {
    let code = ((x as u64).wrapping_mul(31))
        .wrapping_add((y as u64).wrapping_mul(97))
        .wrapping_add(band as u64 * 7);
    match dtype {
        PixelType::Byte => dst.copy_from_slice(&[(code % 256) as u8]),
        PixelType::Int16 => dst.copy_from_slice(&((code % 30000) as i16).to_le_bytes()),
        PixelType::UInt16 => dst.copy_from_slice(&((code % 60000) as u16).to_le_bytes()),
        PixelType::Int32 => dst.copy_from_slice(&(code as i32).to_le_bytes()),
        PixelType::UInt32 => dst.copy_from_slice(&(code as u32).to_le_bytes()),
        PixelType::Float32 => dst.copy_from_slice(&(code as f32).to_le_bytes()),
        PixelType::Float64 => dst.copy_from_slice(&(code as f64).to_le_bytes()),
        PixelType::CInt16 => {
            dst[0..2].copy_from_slice(&((code % 30000) as i16).to_le_bytes());
            dst[2..4].copy_from_slice(&((code % 30000) as i16).to_le_bytes());
        }
        PixelType::CInt32 => {
            dst[0..4].copy_from_slice(&(code as i32).to_le_bytes());
            dst[4..8].copy_from_slice(&(code as i32).to_le_bytes());
        }
        PixelType::CFloat32 => {
            dst[0..4].copy_from_slice(&(code as f32).to_le_bytes());
            dst[4..8].copy_from_slice(&(code as f32).to_le_bytes());
        }
        PixelType::CFloat64 => {
            dst[0..8].copy_from_slice(&(code as f64).to_le_bytes());
            dst[8..16].copy_from_slice(&(code as f64).to_le_bytes());
        }
    }
}
