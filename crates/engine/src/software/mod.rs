//! Pure-Rust imaging engine.
//!
//! Reads the uncompressed container described in [`container`], debayers with
//! simple reference kernels, renders an equirectangular panorama and encodes
//! files with the `image` crate. Quality is adequate for previews and tests;
//! it makes no attempt to match a vendor SDK pixel for pixel.

pub mod container;
pub mod debayer;
mod encode;
mod render;

use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::format::{ColorProcessingMethod, ImageFileFormat, PixelFormat};
use crate::frame::{ImageView, MeshRotation, ProcessedImage, RawFrame, RenderOptions};
use crate::{FrameStream, ImagingEngine};

pub use container::{StreamReader, StreamWriter};

use render::PanoramaRenderer;

/// Software implementation of [`ImagingEngine`].
#[derive(Debug, Default)]
pub struct SoftwareEngine {
    color_method: ColorProcessingMethod,
    calibration: Option<String>,
    falloff: Option<f32>,
    alpha_mask_size: Option<(u32, u32)>,
    renderer: PanoramaRenderer,
}

impl SoftwareEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calibration text loaded by [`ImagingEngine::load_calibration`].
    pub fn calibration(&self) -> Option<&str> {
        self.calibration.as_deref()
    }

    pub fn color_method(&self) -> ColorProcessingMethod {
        self.color_method
    }
}

impl ImagingEngine for SoftwareEngine {
    fn name(&self) -> &str {
        "software"
    }

    fn open_stream(&mut self, path: &Path) -> EngineResult<Box<dyn FrameStream>> {
        Ok(Box::new(StreamReader::open(path)?))
    }

    fn load_calibration(&mut self, path: &Path) -> EngineResult<()> {
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Err(EngineError::invalid_argument("calibration file is empty"));
        }
        self.calibration = Some(text);
        Ok(())
    }

    fn set_color_processing(&mut self, method: ColorProcessingMethod) -> EngineResult<()> {
        self.color_method = method;
        Ok(())
    }

    fn convert_frame(
        &mut self,
        frame: &RawFrame,
        targets: &mut [&mut [u8]],
        pixel_format: PixelFormat,
    ) -> EngineResult<()> {
        debayer::convert(frame, self.color_method, self.falloff, targets, pixel_format)
    }

    fn set_blending_width(&mut self, width: u32) -> EngineResult<()> {
        self.renderer.blending_width = width;
        Ok(())
    }

    fn initialize_alpha_masks(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_argument("alpha mask size must be non-zero"));
        }
        self.alpha_mask_size = Some((width, height));
        Ok(())
    }

    fn set_alpha_masking(&mut self, enabled: bool) -> EngineResult<()> {
        if enabled && self.alpha_mask_size.is_none() {
            return Err(EngineError::not_configured("alpha masks are not initialized"));
        }
        self.renderer.masking = enabled;
        Ok(())
    }

    fn set_falloff_correction(&mut self, enabled: bool, attenuation: f32) -> EngineResult<()> {
        if !attenuation.is_finite() || attenuation < 0.0 {
            return Err(EngineError::invalid_argument(format!(
                "falloff attenuation {attenuation} must be a non-negative number"
            )));
        }
        self.falloff = enabled.then_some(attenuation);
        Ok(())
    }

    fn set_render_options(&mut self, options: RenderOptions) -> EngineResult<()> {
        if options.software_rendering {
            tracing::debug!("Software rendering requested, already rendering in software");
        }
        if options.stabilization {
            tracing::warn!("Stabilization is not supported by the software engine, ignoring");
        }
        self.renderer.anti_aliasing = options.anti_aliasing;
        Ok(())
    }

    fn configure_panorama(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::invalid_argument("canvas size must be non-zero"));
        }
        self.renderer.canvas = Some((width, height));
        Ok(())
    }

    fn set_mesh_rotation(&mut self, rotation: MeshRotation) -> EngineResult<()> {
        self.renderer.rotation = rotation;
        Ok(())
    }

    fn update_textures(&mut self, textures: &[ImageView<'_>]) -> EngineResult<()> {
        self.renderer.update_textures(textures)
    }

    fn render_panorama(&mut self) -> EngineResult<ProcessedImage> {
        self.renderer.render()
    }

    fn save_image(
        &mut self,
        image: &ImageView<'_>,
        path: &Path,
        format: ImageFileFormat,
    ) -> EngineResult<()> {
        encode::save(image, path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_requires_initialized_masks() {
        let mut engine = SoftwareEngine::new();
        assert!(engine.set_alpha_masking(true).is_err());
        engine.initialize_alpha_masks(16, 8).unwrap();
        engine.set_alpha_masking(true).unwrap();
        engine.set_alpha_masking(false).unwrap();
    }

    #[test]
    fn falloff_rejects_negative_attenuation() {
        let mut engine = SoftwareEngine::new();
        assert!(engine.set_falloff_correction(true, -1.0).is_err());
        engine.set_falloff_correction(true, 0.5).unwrap();
        engine.set_falloff_correction(false, 0.5).unwrap();
    }

    #[test]
    fn render_options_toggle_anti_aliasing_only() {
        let mut engine = SoftwareEngine::new();
        engine
            .set_render_options(RenderOptions {
                software_rendering: true,
                anti_aliasing: true,
                stabilization: true,
            })
            .unwrap();
        assert!(engine.renderer.anti_aliasing);

        engine.set_render_options(RenderOptions::default()).unwrap();
        assert!(!engine.renderer.anti_aliasing);
    }

    #[test]
    fn calibration_must_not_be_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.cfg");
        let full = dir.path().join("full.cfg");
        std::fs::write(&empty, "  \n").unwrap();
        std::fs::write(&full, "serial=7").unwrap();

        let mut engine = SoftwareEngine::new();
        assert!(engine.load_calibration(&empty).is_err());
        engine.load_calibration(&full).unwrap();
        assert_eq!(engine.calibration(), Some("serial=7"));
    }
}
