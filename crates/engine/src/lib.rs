//! omniexport Imaging Engine
//!
//! The boundary between the export pipeline and whatever library actually
//! decodes streams, debayers sensor data, stitches panoramas and encodes
//! image files. The pipeline only ever talks to [`ImagingEngine`] and
//! [`FrameStream`]; every call returns an [`EngineResult`] that the caller
//! inspects immediately.
//!
//! # Call sequence
//!
//! ```text
//! open_stream ──► read_header ──► set_color_processing ──► read_frame (probe)
//!                                                              │
//!        set_blending_width / initialize_alpha_masks ◄─────────┘
//!                          │
//!           configure_panorama + set_mesh_rotation   (panorama only)
//!                          │
//!   ┌──── seek ◄───────────┘
//!   ▼
//! read_frame ──► convert_frame ──┬──► save_image × 6             (multi-camera)
//!                                └──► update_textures ──► render_panorama ──► save_image
//! ```
//!
//! [`software::SoftwareEngine`] is a pure-Rust implementation used by the CLI
//! and the test suites.

pub mod error;
pub mod format;
pub mod frame;
pub mod software;

use std::path::Path;

pub use error::*;
pub use format::*;
pub use frame::*;

/// Number of physical cameras in the rig.
pub const CAMERA_COUNT: usize = 6;

/// A stream opened for reading.
pub trait FrameStream {
    /// Read the static stream header.
    fn read_header(&mut self) -> EngineResult<StreamHeader>;

    /// Read the frame at the current position and advance by one.
    ///
    /// The position advances even when the frame is corrupt, so a caller
    /// that retries will get the next frame.
    fn read_frame(&mut self) -> EngineResult<RawFrame>;

    /// Move the read position to `index`.
    fn seek(&mut self, index: u32) -> EngineResult<()>;

    /// Write the calibration blob embedded in the stream to `dest`.
    fn extract_calibration(&mut self, dest: &Path) -> EngineResult<()>;
}

/// Context-level operations of an imaging engine.
///
/// Dropping the engine releases its context.
pub trait ImagingEngine {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Open a recorded stream for reading.
    fn open_stream(&mut self, path: &Path) -> EngineResult<Box<dyn FrameStream>>;

    /// Load camera calibration from a file previously extracted from a stream.
    fn load_calibration(&mut self, path: &Path) -> EngineResult<()>;

    /// Select the debayering algorithm used by [`ImagingEngine::convert_frame`].
    fn set_color_processing(&mut self, method: ColorProcessingMethod) -> EngineResult<()>;

    /// Debayer `frame` into one target buffer per camera.
    ///
    /// Each target must hold exactly `width × height × bytes_per_pixel` bytes
    /// for the output geometry implied by the color processing method.
    fn convert_frame(
        &mut self,
        frame: &RawFrame,
        targets: &mut [&mut [u8]],
        pixel_format: PixelFormat,
    ) -> EngineResult<()>;

    /// Overlap width in pixels used when stitching neighbouring cameras.
    fn set_blending_width(&mut self, width: u32) -> EngineResult<()>;

    /// Precompute alpha masks for textures of the given size.
    fn initialize_alpha_masks(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Enable or disable alpha masking during panoramic rendering.
    fn set_alpha_masking(&mut self, enabled: bool) -> EngineResult<()>;

    /// Configure lens falloff (vignetting) correction.
    fn set_falloff_correction(&mut self, enabled: bool, attenuation: f32) -> EngineResult<()> {
        let _ = (enabled, attenuation);
        Err(EngineError::unsupported("falloff correction"))
    }

    /// Configure renderer quality switches.
    fn set_render_options(&mut self, options: RenderOptions) -> EngineResult<()> {
        let _ = options;
        Err(EngineError::unsupported("render options"))
    }

    /// Configure the off-screen panoramic canvas.
    fn configure_panorama(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Rotate the stitching mesh.
    fn set_mesh_rotation(&mut self, rotation: MeshRotation) -> EngineResult<()>;

    /// Upload one texture per camera for the next render.
    fn update_textures(&mut self, textures: &[ImageView<'_>]) -> EngineResult<()>;

    /// Render the panorama from the current textures as a flat BGR image.
    fn render_panorama(&mut self) -> EngineResult<ProcessedImage>;

    /// Encode `image` and write it to `path`.
    fn save_image(
        &mut self,
        image: &ImageView<'_>,
        path: &Path,
        format: ImageFileFormat,
    ) -> EngineResult<()>;
}
