//! Status values returned by imaging engine calls.

use std::path::PathBuf;

/// Error returned by every [`crate::ImagingEngine`] and [`crate::FrameStream`] call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to open stream {path}: {message}")]
    StreamOpen { path: PathBuf, message: String },

    #[error("Invalid stream header: {message}")]
    InvalidHeader { message: String },

    #[error("End of stream reached at frame {index}")]
    EndOfStream { index: u32 },

    #[error("Frame {index} is out of range (stream has {count} frames)")]
    FrameOutOfRange { index: u32, count: u32 },

    #[error("Frame {index} is corrupt: {message}")]
    CorruptFrame { index: u32, message: String },

    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    #[error("Not configured: {message}")]
    NotConfigured { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Render failed: {message}")]
    Render { message: String },

    #[error("Failed to save {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("Stream has no embedded calibration data")]
    NoCalibration,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion {
            message: msg.into(),
        }
    }

    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured {
            message: msg.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn save(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Save {
            path: path.into(),
            message: msg.into(),
        }
    }
}
