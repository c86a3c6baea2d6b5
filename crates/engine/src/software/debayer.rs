//! Reference demosaicing of RGGB Bayer planes.

use crate::error::{EngineError, EngineResult};
use crate::format::{ColorProcessingMethod, PixelFormat};
use crate::frame::RawFrame;
use crate::CAMERA_COUNT;

/// Strength of the radial gain applied by falloff correction at the corners.
const FALLOFF_STRENGTH: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

fn bayer_channel(x: usize, y: usize) -> Channel {
    match (y % 2, x % 2) {
        (0, 0) => Channel::Red,
        (1, 1) => Channel::Blue,
        _ => Channel::Green,
    }
}

/// One camera's sample plane.
struct Plane<'a> {
    samples: &'a [u8],
    cols: usize,
    rows: usize,
    wide: bool,
}

impl Plane<'_> {
    /// Sample at clamped coordinates.
    fn at(&self, x: i64, y: i64) -> u32 {
        let x = x.clamp(0, self.cols as i64 - 1) as usize;
        let y = y.clamp(0, self.rows as i64 - 1) as usize;
        let i = y * self.cols + x;
        if self.wide {
            u16::from_le_bytes([self.samples[2 * i], self.samples[2 * i + 1]]) as u32
        } else {
            self.samples[i] as u32
        }
    }

    /// Average of each channel over a `size × size` block at `(x0, y0)`.
    fn block_average(&self, x0: usize, y0: usize, size: usize) -> [u32; 3] {
        let mut sums = [0u32; 3];
        let mut counts = [0u32; 3];
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                let slot = channel_slot(bayer_channel(x, y));
                sums[slot] += self.at(x as i64, y as i64);
                counts[slot] += 1;
            }
        }
        average(sums, counts)
    }

    /// Bilinear estimate from the 3×3 neighbourhood.
    fn neighbourhood(&self, x: usize, y: usize, edge_sensing: bool) -> [u32; 3] {
        let own = bayer_channel(x, y);
        let (xi, yi) = (x as i64, y as i64);
        let mut sums = [0u32; 3];
        let mut counts = [0u32; 3];
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (xi + dx, yi + dy);
                if nx < 0 || ny < 0 || nx >= self.cols as i64 || ny >= self.rows as i64 {
                    continue;
                }
                let slot = channel_slot(bayer_channel(nx as usize, ny as usize));
                sums[slot] += self.at(nx, ny);
                counts[slot] += 1;
            }
        }
        let mut rgb = average(sums, counts);
        rgb[channel_slot(own)] = self.at(xi, yi);

        if edge_sensing && own != Channel::Green {
            let horizontal = self.at(xi - 1, yi).abs_diff(self.at(xi + 1, yi));
            let vertical = self.at(xi, yi - 1).abs_diff(self.at(xi, yi + 1));
            if horizontal < vertical {
                rgb[1] = (self.at(xi - 1, yi) + self.at(xi + 1, yi)) / 2;
            } else if vertical < horizontal {
                rgb[1] = (self.at(xi, yi - 1) + self.at(xi, yi + 1)) / 2;
            }
        }
        rgb
    }

    /// Value of the 2×2 cell containing `(x, y)`.
    fn nearest(&self, x: usize, y: usize) -> [u32; 3] {
        let (bx, by) = ((x & !1) as i64, (y & !1) as i64);
        [
            self.at(bx, by),
            (self.at(bx + 1, by) + self.at(bx, by + 1)) / 2,
            self.at(bx + 1, by + 1),
        ]
    }
}

fn channel_slot(channel: Channel) -> usize {
    match channel {
        Channel::Red => 0,
        Channel::Green => 1,
        Channel::Blue => 2,
    }
}

fn average(sums: [u32; 3], counts: [u32; 3]) -> [u32; 3] {
    let mut out = [0u32; 3];
    for i in 0..3 {
        if counts[i] > 0 {
            out[i] = sums[i] / counts[i];
        }
    }
    out
}

/// Output dimensions of a converted camera image.
pub fn output_size(cols: u32, rows: u32, method: ColorProcessingMethod) -> (u32, u32) {
    let divisor = method.downsample_divisor();
    (cols / divisor, rows / divisor)
}

/// Debayer every camera of `frame` into `targets`.
pub(crate) fn convert(
    frame: &RawFrame,
    method: ColorProcessingMethod,
    falloff: Option<f32>,
    targets: &mut [&mut [u8]],
    pixel_format: PixelFormat,
) -> EngineResult<()> {
    if targets.len() != CAMERA_COUNT {
        return Err(EngineError::conversion(format!(
            "expected {CAMERA_COUNT} target buffers, got {}",
            targets.len()
        )));
    }
    if pixel_format == PixelFormat::Bgr {
        return Err(EngineError::conversion(
            "frames convert to BGRU or BGRU16 only",
        ));
    }

    let cols = frame.cols as usize;
    let rows = frame.rows as usize;
    let wide = frame.data_format.is_high_bit_depth();
    let plane_bytes = cols * rows * frame.data_format.sample_bytes();
    if frame.data.len() != plane_bytes * CAMERA_COUNT {
        return Err(EngineError::conversion(format!(
            "frame {} payload holds {} bytes, expected {}",
            frame.index,
            frame.data.len(),
            plane_bytes * CAMERA_COUNT
        )));
    }

    let (out_w, out_h) = output_size(frame.cols, frame.rows, method);
    let (out_w, out_h) = (out_w as usize, out_h as usize);
    let bpp = pixel_format.bytes_per_pixel();
    let expected = out_w * out_h * bpp;

    for (camera, target) in targets.iter_mut().enumerate() {
        if target.len() != expected {
            return Err(EngineError::conversion(format!(
                "camera {camera} buffer holds {} bytes, expected {expected}",
                target.len()
            )));
        }

        let plane = Plane {
            samples: &frame.data[camera * plane_bytes..(camera + 1) * plane_bytes],
            cols,
            rows,
            wide,
        };

        for oy in 0..out_h {
            for ox in 0..out_w {
                let rgb = match method {
                    ColorProcessingMethod::Downsample4 => plane.block_average(ox * 2, oy * 2, 2),
                    ColorProcessingMethod::Downsample16 => {
                        plane.block_average(ox * 4, oy * 4, 4)
                    }
                    ColorProcessingMethod::NearestNeighbor => plane.nearest(ox, oy),
                    ColorProcessingMethod::Monochrome => {
                        let v = plane.at(ox as i64, oy as i64);
                        [v, v, v]
                    }
                    ColorProcessingMethod::HighQualityLinear => {
                        plane.neighbourhood(ox, oy, false)
                    }
                    ColorProcessingMethod::EdgeSensing => plane.neighbourhood(ox, oy, true),
                };

                let gain = falloff
                    .map(|attenuation| falloff_gain(ox, oy, out_w, out_h, attenuation))
                    .unwrap_or(1.0);
                let pixel = &mut target[(oy * out_w + ox) * bpp..][..bpp];
                write_pixel(pixel, rgb, wide, gain, pixel_format);
            }
        }
    }

    Ok(())
}

/// Radial brightening that compensates lens vignetting.
fn falloff_gain(x: usize, y: usize, width: usize, height: usize, attenuation: f32) -> f32 {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let nx = (x as f32 + 0.5 - cx) / cx.max(0.5);
    let ny = (y as f32 + 0.5 - cy) / cy.max(0.5);
    let r2 = (nx * nx + ny * ny) / 2.0;
    1.0 + attenuation * FALLOFF_STRENGTH * r2
}

fn write_pixel(pixel: &mut [u8], rgb: [u32; 3], wide: bool, gain: f32, format: PixelFormat) {
    let [r, g, b] = rgb.map(|v| {
        // Normalize to 16-bit range first.
        let v16 = if wide { v } else { v * 257 };
        ((v16 as f32 * gain).round() as u32).min(u16::MAX as u32)
    });

    match format {
        PixelFormat::Bgru16 => {
            for (i, v) in [b, g, r, u16::MAX as u32].into_iter().enumerate() {
                pixel[2 * i..2 * i + 2].copy_from_slice(&(v as u16).to_le_bytes());
            }
        }
        _ => {
            pixel.copy_from_slice(&[(b >> 8) as u8, (g >> 8) as u8, (r >> 8) as u8, u8::MAX]);
        }
    }
}
