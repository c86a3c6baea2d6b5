//! Per-camera frame buffers.
//!
//! One [`CameraBufferSet`] is allocated after the probe frame and overwritten
//! by every conversion until the run ends.

use omniexport_common::{OmniexportError, OmniexportResult};
use omniexport_engine::{
    ColorProcessingMethod, DataFormat, EngineError, ImageView, ImagingEngine, PixelFormat,
    CAMERA_COUNT,
};

use crate::options::PipelineConfig;

/// Size and layout of one converted camera image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl BufferGeometry {
    /// Geometry for a native `cols × rows` frame converted with `method`.
    pub fn derive(
        cols: u32,
        rows: u32,
        method: ColorProcessingMethod,
        data_format: DataFormat,
    ) -> Self {
        let divisor = method.downsample_divisor();
        Self {
            width: cols / divisor,
            height: rows / divisor,
            pixel_format: data_format.converted_pixel_format(),
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.pixel_format.bytes_per_pixel()
    }

    /// Bytes per camera buffer, `None` on overflow.
    pub fn buffer_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }
}

/// Exactly one buffer per camera, all the same size.
#[derive(Debug)]
pub struct CameraBufferSet {
    geometry: BufferGeometry,
    buffers: [Vec<u8>; CAMERA_COUNT],
}

impl CameraBufferSet {
    /// Allocate zeroed buffers. Anything allocated before a failure is
    /// released on return.
    pub fn allocate(geometry: BufferGeometry) -> OmniexportResult<Self> {
        let bytes = geometry.buffer_len().ok_or(OmniexportError::Allocation {
            camera: 0,
            bytes: usize::MAX,
        })?;
        if bytes == 0 {
            return Err(OmniexportError::initialization(
                "buffer allocation",
                format!(
                    "camera images would be empty ({}x{})",
                    geometry.width, geometry.height
                ),
            ));
        }

        let mut buffers: [Vec<u8>; CAMERA_COUNT] = Default::default();
        for (camera, buffer) in buffers.iter_mut().enumerate() {
            buffer
                .try_reserve_exact(bytes)
                .map_err(|_| OmniexportError::Allocation { camera, bytes })?;
            buffer.resize(bytes, 0);
        }

        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            bytes_per_camera = bytes,
            "Allocated camera buffers"
        );
        Ok(Self { geometry, buffers })
    }

    pub fn geometry(&self) -> BufferGeometry {
        self.geometry
    }

    /// Total bytes held across all cameras.
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(Vec::len).sum()
    }

    /// View of one camera's buffer, `None` for an out-of-range camera.
    pub fn camera_view(&self, camera: usize) -> Option<ImageView<'_>> {
        self.buffers.get(camera).map(|buffer| self.view_of(buffer))
    }

    /// Views of every camera, in camera order.
    pub fn views(&self) -> [ImageView<'_>; CAMERA_COUNT] {
        std::array::from_fn(|camera| self.view_of(&self.buffers[camera]))
    }

    /// Mutable slices for conversion targets, in camera order.
    pub fn targets_mut(&mut self) -> Vec<&mut [u8]> {
        self.buffers.iter_mut().map(Vec::as_mut_slice).collect()
    }

    fn view_of<'a>(&self, buffer: &'a [u8]) -> ImageView<'a> {
        ImageView::new(
            buffer,
            self.geometry.width,
            self.geometry.height,
            self.geometry.pixel_format,
        )
    }
}

/// A stitching resource the engine refused.
#[derive(Debug)]
pub struct NegotiationFailure {
    pub resource: &'static str,
    pub error: EngineError,
}

/// Configure blending, alpha masks, falloff correction and render options.
///
/// None of these are required for export, so failures are collected and
/// logged instead of aborting.
pub fn negotiate_auxiliary(
    engine: &mut dyn ImagingEngine,
    geometry: BufferGeometry,
    config: &PipelineConfig,
) -> Vec<NegotiationFailure> {
    let mut failures = Vec::new();
    let mut attempt = |resource: &'static str, result: Result<(), EngineError>| {
        if let Err(error) = result {
            tracing::warn!(resource, error = %error, "Could not configure stitching resource");
            failures.push(NegotiationFailure { resource, error });
        }
    };

    attempt(
        "blending width",
        engine.set_blending_width(config.blending_width),
    );
    attempt(
        "alpha masks",
        engine.initialize_alpha_masks(geometry.width, geometry.height),
    );
    attempt("alpha masking", engine.set_alpha_masking(true));

    if config.falloff.enabled {
        attempt(
            "falloff correction",
            engine.set_falloff_correction(true, config.falloff.attenuation),
        );
    }
    if config.render_options != Default::default() {
        attempt("render options", engine.set_render_options(config.render_options));
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsampling_scales_each_side() {
        let hq = BufferGeometry::derive(
            1600,
            1200,
            ColorProcessingMethod::HighQualityLinear,
            DataFormat::Raw8,
        );
        assert_eq!((hq.width, hq.height, hq.bytes_per_pixel()), (1600, 1200, 4));

        let down4 =
            BufferGeometry::derive(1600, 1200, ColorProcessingMethod::Downsample4, DataFormat::Raw8);
        assert_eq!((down4.width, down4.height), (800, 600));

        let down16 = BufferGeometry::derive(
            1600,
            1200,
            ColorProcessingMethod::Downsample16,
            DataFormat::Raw8,
        );
        assert_eq!((down16.width, down16.height), (400, 300));
        assert_eq!(down16.bytes_per_pixel(), 4);
    }

    #[test]
    fn high_bit_depth_uses_sixteen_bit_pixels() {
        let geometry = BufferGeometry::derive(
            1600,
            1200,
            ColorProcessingMethod::HighQualityLinear,
            DataFormat::Raw12,
        );
        assert_eq!((geometry.width, geometry.height), (1600, 1200));
        assert_eq!(geometry.pixel_format, PixelFormat::Bgru16);
        assert_eq!(geometry.buffer_len(), Some(1600 * 1200 * 8));
    }

    #[test]
    fn allocates_six_equal_buffers() {
        let geometry = BufferGeometry {
            width: 8,
            height: 4,
            pixel_format: PixelFormat::Bgru,
        };
        let mut set = CameraBufferSet::allocate(geometry).unwrap();
        assert_eq!(set.total_bytes(), CAMERA_COUNT * 8 * 4 * 4);
        assert_eq!(set.targets_mut().len(), CAMERA_COUNT);
        assert!(set.views().iter().all(|v| v.validate().is_ok()));
        assert!(set.camera_view(5).is_some());
        assert!(set.camera_view(6).is_none());
    }

    #[test]
    fn overflowing_or_empty_geometry_is_fatal() {
        let huge = BufferGeometry {
            width: u32::MAX,
            height: u32::MAX,
            pixel_format: PixelFormat::Bgru16,
        };
        assert!(matches!(
            CameraBufferSet::allocate(huge),
            Err(OmniexportError::Allocation { .. })
        ));

        let empty = BufferGeometry {
            width: 0,
            height: 4,
            pixel_format: PixelFormat::Bgru,
        };
        assert!(CameraBufferSet::allocate(empty).is_err());
    }

    #[test]
    fn writes_through_targets_show_in_views() {
        let geometry = BufferGeometry {
            width: 2,
            height: 1,
            pixel_format: PixelFormat::Bgru,
        };
        let mut set = CameraBufferSet::allocate(geometry).unwrap();
        set.targets_mut()[3][0] = 42;
        assert_eq!(set.camera_view(3).unwrap().data[0], 42);
        assert_eq!(set.camera_view(2).unwrap().data[0], 0);
    }
}
