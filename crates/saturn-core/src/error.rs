use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaturnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Unsupported source: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("No reference points could be placed")]
    NoReferencePoints,

    #[error("Frame size {actual_width}x{actual_height} does not match sequence size {width}x{height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, SaturnError>;
