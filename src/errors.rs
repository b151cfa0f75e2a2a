use thiserror::Error;

/// Errors surfaced by the chip reader's public entry points.
///
/// Per the worker error policy, only configuration-time and adapter-open
/// failures ever reach a caller through this type; steady-state read
/// failures inside a worker or `get_inference_chip` are retried internally
/// and never turned into an `Err`.
#[derive(Error, Debug)]
pub enum ChipReaderError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("raster source open failed: {0}")]
    OpenFailed(#[from] anyhow::Error),

    #[error("raster read failed: {0}")]
    ReadFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation not valid in current mode")]
    WrongMode,
}

pub type Result<T> = std::result::Result<T, ChipReaderError>;
