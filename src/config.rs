use crate::errors::{ChipReaderError, Result};
use crate::pixel::PixelType;

/// Process-wide operation mode. Training and Evaluation spawn worker
/// threads; Inference does not and only serves `get_inference_chip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Idle = 0,
    Training = 1,
    Evaluation = 2,
    Inference = 3,
}

impl Mode {
    pub fn from_u8(v: u8) -> Option<Mode> {
        match v {
            0 => Some(Mode::Idle),
            1 => Some(Mode::Training),
            2 => Some(Mode::Evaluation),
            3 => Some(Mode::Inference),
            _ => None,
        }
    }

    pub fn spawns_workers(self) -> bool {
        matches!(self, Mode::Training | Mode::Evaluation)
    }
}

/// Configuration frozen for the lifetime of one `start`/`stop` cycle.
#[derive(Debug, Clone)]
pub struct ChipReaderConfig {
    pub n_workers: usize,
    pub n_slots: usize,
    pub imagery_path: String,
    pub label_path: Option<String>,
    pub imagery_dtype: PixelType,
    pub label_dtype: Option<PixelType>,
    pub mode: Mode,
    pub window_size: usize,
    pub band_count: usize,
    pub bands: Vec<u32>,
}

impl ChipReaderConfig {
    /// Structural checks that don't require the raster to be open yet.
    /// Dimension-dependent checks (window_size vs. width/height) happen in
    /// `validate_against_dimensions` once the primary handle is open.
    pub fn validate(&self) -> Result<()> {
        if self.n_workers == 0 {
            return Err(ChipReaderError::InvalidConfig("n_workers must be >= 1".into()));
        }
        if self.n_slots == 0 {
            return Err(ChipReaderError::InvalidConfig("n_slots must be >= 1".into()));
        }
        if self.window_size == 0 {
            return Err(ChipReaderError::InvalidConfig("window_size must be >= 1".into()));
        }
        if self.bands.is_empty() {
            return Err(ChipReaderError::InvalidConfig("bands must be non-empty".into()));
        }
        if self.bands.len() != self.band_count {
            return Err(ChipReaderError::InvalidConfig(
                "bands list length must equal band_count".into(),
            ));
        }
        if self.label_path.is_some() != self.label_dtype.is_some() {
            return Err(ChipReaderError::InvalidConfig(
                "label_path and label_dtype must be provided together".into(),
            ));
        }
        Ok(())
    }

    /// A window_size larger than either raster dimension can never yield an
    /// admissible chip coordinate (the selector's modulus would divide by
    /// zero chip columns/rows). This is rejected up front rather than left
    /// to hang forever inside the worker loop. A window_size that merely
    /// leaves an edge remainder is accepted silently.
    pub fn validate_against_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if self.window_size > width || self.window_size > height {
            return Err(ChipReaderError::InvalidConfig(format!(
                "window_size {} exceeds raster dimensions {}x{}",
                self.window_size, width, height
            )));
        }
        Ok(())
    }
}
