//! Error types for the digitizer.
//!
//! Only missing or undecodable input and I/O failures are errors. Degraded
//! detections, rejected scans and zero-filled leads are regular return values.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DigitizeError>;

#[derive(Error, Debug)]
pub enum DigitizeError {
    /// Image file could not be opened or decoded.
    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image could not be encoded or written.
    #[error("failed to save image {}: {source}", path.display())]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Raster has no pixels or a buffer that does not match its dimensions.
    #[error("image is empty or malformed ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    /// Raw buffer length does not match `width * height * channels`.
    #[error("buffer of {len} values does not match {width}x{height}x{channels}")]
    ChannelMismatch {
        width: usize,
        height: usize,
        channels: usize,
        len: usize,
    },

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool for batch processing could not be created.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
