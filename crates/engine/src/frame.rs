//! Frames, headers and image descriptors exchanged with the engine.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::format::{DataFormat, PixelFormat};

/// Static information recorded at the start of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHeader {
    /// Base unit serial number.
    pub serial_base: u32,

    /// Camera head serial number.
    pub serial_head: u32,

    /// Recording frame rate.
    pub frame_rate: f32,

    /// Native sensor data format.
    pub data_format: DataFormat,

    /// Native per-camera resolution.
    pub cols: u32,
    pub rows: u32,

    /// Number of frames in the stream.
    pub frame_count: u32,

    /// Container version.
    #[serde(default)]
    pub stream_version: u32,
}

/// One undecoded multi-camera frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Zero-based frame index within the stream.
    pub index: u32,

    /// Native per-camera dimensions.
    pub cols: u32,
    pub rows: u32,

    pub data_format: DataFormat,

    /// Engine-specific payload.
    pub data: Vec<u8>,
}

/// Borrowed pixel buffer with its geometry. Wrapping a buffer never copies it.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl<'a> ImageView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            pixel_format,
        }
    }

    /// Bytes a buffer of this geometry must hold.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Check that the buffer length matches the declared geometry.
    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::invalid_argument("image has zero area"));
        }
        if self.data.len() != self.expected_len() {
            return Err(EngineError::invalid_argument(format!(
                "image buffer holds {} bytes, {}x{} {:?} needs {}",
                self.data.len(),
                self.width,
                self.height,
                self.pixel_format,
                self.expected_len()
            )));
        }
        Ok(())
    }
}

/// Owned image produced by the engine (e.g. a rendered panorama).
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl ProcessedImage {
    pub fn view(&self) -> ImageView<'_> {
        ImageView::new(&self.data, self.width, self.height, self.pixel_format)
    }
}

/// Rotation of the stitching mesh in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshRotation {
    /// Pitch.
    pub x: f64,
    /// Yaw.
    pub y: f64,
    /// Roll.
    pub z: f64,
}

impl MeshRotation {
    /// Build a rotation from pitch ("Front") and yaw ("Down") in degrees.
    /// Roll is always zero.
    pub fn from_degrees(front: f64, down: f64) -> Self {
        Self {
            x: front.to_radians(),
            y: down.to_radians(),
            z: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

/// Renderer quality switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub software_rendering: bool,
    pub anti_aliasing: bool,
    pub stabilization: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_converts_degrees_and_zeroes_roll() {
        let rotation = MeshRotation::from_degrees(90.0, -180.0);
        assert!((rotation.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((rotation.y + std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(rotation.z, 0.0);
        assert!(MeshRotation::from_degrees(0.0, 0.0).is_identity());
    }

    #[test]
    fn view_validation_checks_length() {
        let data = vec![0u8; 4 * 3 * 4];
        assert!(ImageView::new(&data, 4, 3, PixelFormat::Bgru).validate().is_ok());
        assert!(ImageView::new(&data, 4, 3, PixelFormat::Bgru16)
            .validate()
            .is_err());
        assert!(ImageView::new(&data, 0, 3, PixelFormat::Bgru).validate().is_err());
    }
}
