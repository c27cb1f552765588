//! Error types for board recognition and capture.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for recognition and capture operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Everything that can go wrong between grabbing a window and printing a FEN.
#[derive(Debug, Error)]
pub enum BoardError {
    /// No usable calibration on disk.
    #[error("not calibrated ({0}); run with --calibrate first")]
    NotCalibrated(String),
    /// The operator aborted the calibration prompt before two points were given.
    #[error("calibration cancelled")]
    CalibrationCancelled,
    /// The template directory yielded no usable piece images.
    #[error("no templates found in {}", .0.display())]
    NoTemplatesFound(PathBuf),
    #[error("window not found: {0}")]
    WindowNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("analysis dispatch failed: {0}")]
    SinkDispatchFailed(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl BoardError {
    /// Capture and dispatch failures can be retried on the next cycle; the rest end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BoardError::WindowNotFound(_)
                | BoardError::CaptureFailed(_)
                | BoardError::SinkDispatchFailed(_)
        )
    }
}
