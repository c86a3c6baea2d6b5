//! Output directory and file naming.

use std::path::{Path, PathBuf};

use omniexport_common::{OmniexportError, OmniexportResult};
use omniexport_engine::ImageFileFormat;

/// Owns the output directory that every exported file lands in.
#[derive(Debug, Clone)]
pub struct DirectoryManager {
    root: PathBuf,
}

impl DirectoryManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory chain. Existing directories are fine.
    pub fn ensure(&self) -> OmniexportResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|source| OmniexportError::Directory {
            path: self.root.clone(),
            source,
        })?;
        tracing::debug!(path = %self.root.display(), "Output directory ready");
        Ok(())
    }

    /// `<root>/<frame:06>_cam<camera>.<ext>`
    pub fn camera_file(&self, frame: u32, camera: usize, format: ImageFileFormat) -> PathBuf {
        camera_file_name(&self.root, frame, camera, format)
    }

    /// `<root>/<frame:06>.<ext>`
    pub fn panorama_file(&self, frame: u32, format: ImageFileFormat) -> PathBuf {
        panorama_file_name(&self.root, frame, format)
    }
}

pub fn camera_file_name(
    prefix: &Path,
    frame: u32,
    camera: usize,
    format: ImageFileFormat,
) -> PathBuf {
    prefix.join(format!("{frame:06}_cam{camera}.{}", format.extension()))
}

pub fn panorama_file_name(prefix: &Path, frame: u32, format: ImageFileFormat) -> PathBuf {
    prefix.join(format!("{frame:06}.{}", format.extension()))
}
