//! Error types shared across omniexport crates.
//!
//! Only run-level failures live here. Per-frame and per-file problems are
//! reported as values by the pipeline and never become an `OmniexportError`.

use std::path::PathBuf;

/// Top-level error type for omniexport operations.
///
/// Every variant aborts the run; the CLI maps any of them to exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum OmniexportError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Initialization failed at {stage}: {message}")]
    Initialization { stage: String, message: String },

    #[error("Failed to allocate {bytes} bytes for camera {camera} frame buffer")]
    Allocation { camera: usize, bytes: usize },

    #[error("Failed to create output directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using OmniexportError.
pub type OmniexportResult<T> = Result<T, OmniexportError>;

impl OmniexportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a failure of one of the startup stages (stream open, header read,
    /// probe frame, canvas setup, initial seek).
    pub fn initialization(stage: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Initialization {
            stage: stage.into(),
            message: err.to_string(),
        }
    }

    /// Whether the run failed before any engine resource was touched.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
