//! Exporters that persist one frame's worth of images.
//!
//! Exporters never fail: every write is attempted and its outcome recorded in
//! the returned [`ExportResult`].

use std::path::PathBuf;

use omniexport_engine::{EngineError, ImageFileFormat, ImagingEngine};

use crate::buffers::CameraBufferSet;
use crate::options::ExportMode;
use crate::output::DirectoryManager;

/// Step of an export that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Render,
    Save,
}

/// One write that did not happen.
#[derive(Debug)]
pub struct ExportFailure {
    pub stage: ExportStage,
    /// Camera whose image failed, for multi-camera exports.
    pub camera: Option<usize>,
    /// Intended output file, when one was named.
    pub path: Option<PathBuf>,
    pub error: EngineError,
}

/// Outcome of exporting one frame.
#[derive(Debug)]
pub enum ExportResult {
    Success {
        written: Vec<PathBuf>,
    },
    PartialFailure {
        written: Vec<PathBuf>,
        failures: Vec<ExportFailure>,
    },
}

impl ExportResult {
    fn from_parts(written: Vec<PathBuf>, failures: Vec<ExportFailure>) -> Self {
        if failures.is_empty() {
            Self::Success { written }
        } else {
            Self::PartialFailure { written, failures }
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        match self {
            Self::Success { written } | Self::PartialFailure { written, .. } => written,
        }
    }

    pub fn failures(&self) -> &[ExportFailure] {
        match self {
            Self::Success { .. } => &[],
            Self::PartialFailure { failures, .. } => failures,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Saves each camera's converted buffer as its own file.
#[derive(Debug, Clone)]
pub struct MultiCameraExporter {
    output: DirectoryManager,
    format: ImageFileFormat,
}

impl MultiCameraExporter {
    pub fn new(output: DirectoryManager, format: ImageFileFormat) -> Self {
        Self { output, format }
    }

    pub fn export(
        &self,
        engine: &mut dyn ImagingEngine,
        frame: u32,
        buffers: &CameraBufferSet,
    ) -> ExportResult {
        let mut written = Vec::new();
        let mut failures = Vec::new();

        for (camera, view) in buffers.views().iter().enumerate() {
            let path = self.output.camera_file(frame, camera, self.format);
            match engine.save_image(view, &path, self.format) {
                Ok(()) => {
                    tracing::debug!(frame, camera, path = %path.display(), "Saved camera image");
                    written.push(path);
                }
                Err(error) => {
                    tracing::warn!(frame, camera, error = %error, "Could not save camera image");
                    failures.push(ExportFailure {
                        stage: ExportStage::Save,
                        camera: Some(camera),
                        path: Some(path),
                        error,
                    });
                }
            }
        }

        ExportResult::from_parts(written, failures)
    }
}

/// Renders the current textures into one panorama and saves it.
#[derive(Debug, Clone)]
pub struct PanoramaExporter {
    output: DirectoryManager,
    format: ImageFileFormat,
}

impl PanoramaExporter {
    pub fn new(output: DirectoryManager, format: ImageFileFormat) -> Self {
        Self { output, format }
    }

    /// Textures must already hold this frame.
    pub fn export(&self, engine: &mut dyn ImagingEngine, frame: u32) -> ExportResult {
        let image = match engine.render_panorama() {
            Ok(image) => image,
            Err(error) => {
                tracing::error!(frame, error = %error, "Could not render panorama");
                return ExportResult::from_parts(
                    Vec::new(),
                    vec![ExportFailure {
                        stage: ExportStage::Render,
                        camera: None,
                        path: None,
                        error,
                    }],
                );
            }
        };

        let path = self.output.panorama_file(frame, self.format);
        match engine.save_image(&image.view(), &path, self.format) {
            Ok(()) => {
                tracing::debug!(frame, path = %path.display(), "Saved panorama");
                ExportResult::from_parts(vec![path], Vec::new())
            }
            Err(error) => {
                tracing::error!(frame, error = %error, "Could not save panorama");
                ExportResult::from_parts(
                    Vec::new(),
                    vec![ExportFailure {
                        stage: ExportStage::Save,
                        camera: None,
                        path: Some(path),
                        error,
                    }],
                )
            }
        }
    }
}

/// The exporter selected by the export mode.
#[derive(Debug, Clone)]
pub enum ExportStrategy {
    MultiCamera(MultiCameraExporter),
    Panorama(PanoramaExporter),
}

impl ExportStrategy {
    pub fn new(mode: ExportMode, output: DirectoryManager, format: ImageFileFormat) -> Self {
        match mode {
            ExportMode::MultiCamera => Self::MultiCamera(MultiCameraExporter::new(output, format)),
            ExportMode::Panorama => Self::Panorama(PanoramaExporter::new(output, format)),
        }
    }

    pub fn mode(&self) -> ExportMode {
        match self {
            Self::MultiCamera(_) => ExportMode::MultiCamera,
            Self::Panorama(_) => ExportMode::Panorama,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::BufferGeometry;
    use omniexport_engine::software::SoftwareEngine;
    use omniexport_engine::PixelFormat;

    fn buffers() -> CameraBufferSet {
        CameraBufferSet::allocate(BufferGeometry {
            width: 4,
            height: 2,
            pixel_format: PixelFormat::Bgru,
        })
        .unwrap()
    }

    #[test]
    fn multi_camera_writes_one_file_per_camera() {
        let dir = tempfile::tempdir().unwrap();
        let output = DirectoryManager::new(dir.path());
        let exporter = MultiCameraExporter::new(output, ImageFileFormat::Png);

        let mut engine = SoftwareEngine::new();
        let result = exporter.export(&mut engine, 7, &buffers());
        assert!(result.is_success());
        assert_eq!(result.written().len(), 6);
        assert!(dir.path().join("000007_cam0.png").exists());
        assert!(dir.path().join("000007_cam5.png").exists());
    }

    #[test]
    fn missing_directory_fails_every_camera_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let output = DirectoryManager::new(dir.path().join("never-created"));
        let exporter = MultiCameraExporter::new(output, ImageFileFormat::Bmp);

        let mut engine = SoftwareEngine::new();
        let result = exporter.export(&mut engine, 0, &buffers());
        assert!(result.written().is_empty());
        assert_eq!(result.failures().len(), 6);
        assert_eq!(result.failures()[4].camera, Some(4));
    }

    #[test]
    fn panorama_render_failure_abandons_frame() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = PanoramaExporter::new(DirectoryManager::new(dir.path()), ImageFileFormat::Jpeg);

        // No canvas configured.
        let mut engine = SoftwareEngine::new();
        let result = exporter.export(&mut engine, 1);
        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].stage, ExportStage::Render);
        assert!(!dir.path().join("000001.jpg").exists());
    }

    #[test]
    fn panorama_is_saved_under_frame_number() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = PanoramaExporter::new(DirectoryManager::new(dir.path()), ImageFileFormat::Png);
        let set = buffers();

        let mut engine = SoftwareEngine::new();
        engine.configure_panorama(32, 16).unwrap();
        engine.update_textures(&set.views()).unwrap();
        let result = exporter.export(&mut engine, 12);
        assert!(result.is_success());
        assert_eq!(result.written(), &[dir.path().join("000012.png")]);
    }

    #[test]
    fn strategy_follows_mode() {
        let output = DirectoryManager::new("out");
        assert_eq!(
            ExportStrategy::new(ExportMode::MultiCamera, output.clone(), ImageFileFormat::Jpeg)
                .mode(),
            ExportMode::MultiCamera
        );
        assert_eq!(
            ExportStrategy::new(ExportMode::Panorama, output, ImageFileFormat::Jpeg).mode(),
            ExportMode::Panorama
        );
    }
}
