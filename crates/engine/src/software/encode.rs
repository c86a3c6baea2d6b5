//! Image file encoding via the `image` crate.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};

use crate::error::{EngineError, EngineResult};
use crate::format::{ImageFileFormat, PixelFormat};
use crate::frame::ImageView;

fn image_format(format: ImageFileFormat) -> ImageFormat {
    match format {
        ImageFileFormat::Bmp => ImageFormat::Bmp,
        ImageFileFormat::Jpeg => ImageFormat::Jpeg,
        ImageFileFormat::Tiff => ImageFormat::Tiff,
        ImageFileFormat::Png => ImageFormat::Png,
    }
}

/// Build an encodable image from a BGR(U) buffer.
///
/// 16-bit buffers stay 16-bit when the target format can hold them and are
/// reduced to their high bytes otherwise.
fn to_dynamic_image(view: &ImageView<'_>, format: ImageFileFormat) -> EngineResult<DynamicImage> {
    view.validate()?;
    let (w, h) = (view.width, view.height);

    let image = match view.pixel_format {
        PixelFormat::Bgr => {
            let rgb = view
                .data
                .chunks_exact(3)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();
            DynamicImage::ImageRgb8(rgb_image(w, h, rgb)?)
        }
        PixelFormat::Bgru => {
            let rgb = view
                .data
                .chunks_exact(4)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();
            DynamicImage::ImageRgb8(rgb_image(w, h, rgb)?)
        }
        PixelFormat::Bgru16 if format.supports_16_bit() => {
            let rgb: Vec<u16> = view
                .data
                .chunks_exact(8)
                .flat_map(|p| {
                    [
                        u16::from_le_bytes([p[4], p[5]]),
                        u16::from_le_bytes([p[2], p[3]]),
                        u16::from_le_bytes([p[0], p[1]]),
                    ]
                })
                .collect();
            let buffer = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w, h, rgb)
                .ok_or_else(|| EngineError::invalid_argument("16-bit buffer size mismatch"))?;
            DynamicImage::ImageRgb16(buffer)
        }
        PixelFormat::Bgru16 => {
            let rgb = view
                .data
                .chunks_exact(8)
                .flat_map(|p| [p[5], p[3], p[1]])
                .collect();
            DynamicImage::ImageRgb8(rgb_image(w, h, rgb)?)
        }
    };
    Ok(image)
}

fn rgb_image(width: u32, height: u32, data: Vec<u8>) -> EngineResult<RgbImage> {
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| EngineError::invalid_argument("8-bit buffer size mismatch"))
}

/// Encode `view` as `format` and write it to `path`.
pub(crate) fn save(view: &ImageView<'_>, path: &Path, format: ImageFileFormat) -> EngineResult<()> {
    let image = to_dynamic_image(view, format)?;
    image
        .save_with_format(path, image_format(format))
        .map_err(|e| EngineError::save(path, e.to_string()))
}
