//! Optional real raster backend on top of the `gdal` crate. Feature-gated
//! because the raster backend is treated as an external collaborator;
//! this adapter is one concrete implementation of the `RasterSource`
//! capability, not part of the required core.

use gdal::raster::GdalDataType;
use gdal::Dataset;

use crate::errors::{ChipReaderError, Result};
use crate::pixel::{CoverageStatus, PixelType};
use crate::raster::{RasterSource, RasterSourceOpener};

#[derive(Debug, Clone, Default)]
pub struct GdalRasterOpener;

impl RasterSourceOpener for GdalRasterOpener {
    fn open(&self, path: &str) -> Result<Box<dyn RasterSource>> {
        let dataset = Dataset::open(path).map_err(|e| ChipReaderError::OpenFailed(e.into()))?;
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        Ok(Box::new(GdalRasterSource {
            dataset,
            width,
            height,
            band_count,
        }))
    }
}

pub struct GdalRasterSource {
    dataset: Dataset,
    width: usize,
    height: usize,
    band_count: usize,
}

impl RasterSource for GdalRasterSource {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_count(&self) -> usize {
        self.band_count
    }

    fn coverage_status(&self, x: usize, y: usize, w: usize, h: usize) -> CoverageStatus {
        let band = match self.dataset.rasterband(1) {
            Ok(b) => b,
            Err(_) => return CoverageStatus::Full,
        };
        let no_data = band.no_data_value();
        let sample = band.read_as::<f64>(
            (x as isize, y as isize),
            (w, h),
            (1, 1),
            Some(gdal::raster::ResampleAlg::Average),
        );
        match (sample, no_data) {
            (Ok(buf), Some(nodata)) => {
                if buf.data().iter().all(|v| (*v - nodata).abs() < f64::EPSILON) {
                    CoverageStatus::Empty
                } else {
                    CoverageStatus::Full
                }
            }
            (Ok(_), None) => CoverageStatus::Full,
            (Err(_), _) => CoverageStatus::Empty,
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

        for (band_pos, &band_index) in bands.iter().enumerate() {
            let band = self
                .dataset
                .rasterband(band_index as isize)
                .map_err(|e| ChipReaderError::ReadFailed(e.to_string()))?;
            read_band_into(&band, x, y, w, h, dtype, bands.len(), band_pos, out)?;
        }
        Ok(())
    }
}

/// Reads one band's window and scatters it into the per-pixel-interleaved
/// `out` buffer at `band_pos` among `n_bands` total bands.
#[allow(clippy::too_many_arguments)]
fn read_band_into(
    band: &gdal::raster::RasterBand,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
    dtype: PixelType,
    n_bands: usize,
    band_pos: usize,
    out: &mut [u8],
) -> Result<()> {
    let word = dtype.word_size();
    let stride = word * n_bands;

    macro_rules! scatter {
        ($ty:ty) => {{
            let buf = band
                .read_as::<$ty>((x as isize, y as isize), (w, h), (w, h), None)
                .map_err(|e| ChipReaderError::ReadFailed(e.to_string()))?;
            for (i, value) in buf.data().iter().enumerate() {
                let offset = i * stride + band_pos * word;
                out[offset..offset + word].copy_from_slice(&value.to_le_bytes());
            }
        }};
    }

    match dtype {
        PixelType::Byte => scatter!(u8),
        PixelType::Int16 => scatter!(i16),
        PixelType::UInt16 => scatter!(u16),
        PixelType::Int32 => scatter!(i32),
        PixelType::UInt32 => scatter!(u32),
        PixelType::Float32 => scatter!(f32),
        PixelType::Float64 => scatter!(f64),
        PixelType::CInt16 | PixelType::CInt32 | PixelType::CFloat32 | PixelType::CFloat64 => {
            return Err(ChipReaderError::ReadFailed(
                "complex pixel types are not supported by the GDAL backend".into(),
            ));
        }
    }
    Ok(())
}

/// Maps our pixel type enum to GDAL's own, for callers that want to assert
/// the backend's native type lines up with the configured `dtype`.
pub fn to_gdal_data_type(dtype: PixelType) -> Option<GdalDataType> {
    match dtype {
        PixelType::Byte => Some(GdalDataType::UInt8),
        PixelType::Int16 => Some(GdalDataType::Int16),
        PixelType::UInt16 => Some(GdalDataType::UInt16),
        PixelType::Int32 => Some(GdalDataType::Int32),
        PixelType::UInt32 => Some(GdalDataType::UInt32),
        PixelType::Float32 => Some(GdalDataType::Float32),
        PixelType::Float64 => Some(GdalDataType::Float64),
        _ => None,
    }
}
