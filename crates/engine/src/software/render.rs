//! Equirectangular panorama renderer.
//!
//! Cameras 0..=4 each cover a 72° yaw sector below the zenith cap; camera 5
//! looks straight up and covers everything above [`ZENITH_LATITUDE`].

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use crate::error::{EngineError, EngineResult};
use crate::format::PixelFormat;
use crate::frame::{ImageView, MeshRotation, ProcessedImage};
use crate::CAMERA_COUNT;

const SIDE_CAMERAS: usize = CAMERA_COUNT - 1;
const TOP_CAMERA: usize = CAMERA_COUNT - 1;
const ZENITH_LATITUDE: f64 = FRAC_PI_4;
const SECTOR: f64 = TAU / SIDE_CAMERAS as f64;

/// Copy of the textures uploaded for the next render.
#[derive(Debug, Default)]
struct TextureSet {
    width: usize,
    height: usize,
    pixel_format: Option<PixelFormat>,
    planes: Vec<Vec<u8>>,
}

impl TextureSet {
    /// RGB of the texel nearest to normalized `(s, t)`.
    fn sample(&self, camera: usize, s: f64, t: f64) -> [f64; 3] {
        let x = ((s.clamp(0.0, 1.0) * self.width as f64) as usize).min(self.width - 1);
        let y = ((t.clamp(0.0, 1.0) * self.height as f64) as usize).min(self.height - 1);
        let plane = &self.planes[camera];
        match self.pixel_format {
            Some(PixelFormat::Bgru16) => {
                let i = (y * self.width + x) * 8;
                // High byte of each little-endian channel.
                [plane[i + 5], plane[i + 3], plane[i + 1]].map(f64::from)
            }
            _ => {
                let i = (y * self.width + x) * 4;
                [plane[i + 2], plane[i + 1], plane[i]].map(f64::from)
            }
        }
    }
}

/// Off-screen renderer state.
#[derive(Debug, Default)]
pub(crate) struct PanoramaRenderer {
    pub canvas: Option<(u32, u32)>,
    pub rotation: MeshRotation,
    pub blending_width: u32,
    pub masking: bool,
    pub anti_aliasing: bool,
    textures: TextureSet,
}

impl PanoramaRenderer {
    /// Replace the current textures, reusing allocations.
    pub fn update_textures(&mut self, textures: &[ImageView<'_>]) -> EngineResult<()> {
        if textures.len() != CAMERA_COUNT {
            return Err(EngineError::invalid_argument(format!(
                "expected {CAMERA_COUNT} textures, got {}",
                textures.len()
            )));
        }
        let first = textures[0];
        if first.pixel_format == PixelFormat::Bgr {
            return Err(EngineError::invalid_argument(
                "textures must be BGRU or BGRU16",
            ));
        }
        for texture in textures {
            texture.validate()?;
            if (texture.width, texture.height, texture.pixel_format)
                != (first.width, first.height, first.pixel_format)
            {
                return Err(EngineError::invalid_argument(
                    "all textures must share one geometry",
                ));
            }
        }

        self.textures.width = first.width as usize;
        self.textures.height = first.height as usize;
        self.textures.pixel_format = Some(first.pixel_format);
        self.textures.planes.resize_with(CAMERA_COUNT, Vec::new);
        for (plane, texture) in self.textures.planes.iter_mut().zip(textures) {
            plane.clear();
            plane.extend_from_slice(texture.data);
        }
        Ok(())
    }

    /// Render the panorama as flat BGR.
    pub fn render(&self) -> EngineResult<ProcessedImage> {
        let (width, height) = self
            .canvas
            .ok_or_else(|| EngineError::not_configured("panoramic canvas size not set"))?;
        if self.textures.pixel_format.is_none() {
            return Err(EngineError::render("no textures uploaded"));
        }

        let samples = if self.anti_aliasing { 2 } else { 1 };
        let weight = 1.0 / (samples * samples) as f64;
        let (w, h) = (width as usize, height as usize);
        let mut data = vec![0u8; w * h * 3];

        for v in 0..h {
            for u in 0..w {
                let mut acc = [0.0f64; 3];
                for sy in 0..samples {
                    for sx in 0..samples {
                        let fu = (u as f64 + (sx as f64 + 0.5) / samples as f64) / w as f64;
                        let fv = (v as f64 + (sy as f64 + 0.5) / samples as f64) / h as f64;
                        let rgb = self.shade(fu, fv, width);
                        for c in 0..3 {
                            acc[c] += rgb[c] * weight;
                        }
                    }
                }
                let i = (v * w + u) * 3;
                data[i] = acc[2].round().clamp(0.0, 255.0) as u8;
                data[i + 1] = acc[1].round().clamp(0.0, 255.0) as u8;
                data[i + 2] = acc[0].round().clamp(0.0, 255.0) as u8;
            }
        }

        Ok(ProcessedImage {
            data,
            width,
            height,
            pixel_format: PixelFormat::Bgr,
        })
    }

    /// Color seen along the view ray through normalized canvas point `(fu, fv)`.
    fn shade(&self, fu: f64, fv: f64, canvas_width: u32) -> [f64; 3] {
        let lon = fu * TAU - PI;
        let lat = FRAC_PI_2 - fv * PI;
        let ray = self.rotate([lat.cos() * lon.sin(), lat.sin(), lat.cos() * lon.cos()]);

        let lat = ray[1].clamp(-1.0, 1.0).asin();
        if lat > ZENITH_LATITUDE {
            let s = (ray[0] / ray[1] + 1.0) / 2.0;
            let t = (ray[2] / ray[1] + 1.0) / 2.0;
            return self.textures.sample(TOP_CAMERA, s, t);
        }

        let azimuth = ray[0].atan2(ray[2]) + PI;
        let camera = ((azimuth / SECTOR) as usize).min(SIDE_CAMERAS - 1);
        let local = azimuth - camera as f64 * SECTOR;
        let t = (ZENITH_LATITUDE - lat) / (ZENITH_LATITUDE + FRAC_PI_2);
        let own = self.textures.sample(camera, local / SECTOR, t);

        if !self.masking || self.blending_width == 0 {
            return own;
        }

        // Crossfade towards the neighbouring camera inside the seam band.
        let half_band = (self.blending_width as f64 / canvas_width as f64 * TAU / 2.0)
            .min(SECTOR / 2.0);
        let (neighbour, neighbour_s, distance) = if local < half_band {
            (
                (camera + SIDE_CAMERAS - 1) % SIDE_CAMERAS,
                (local + SECTOR) / SECTOR,
                local,
            )
        } else if SECTOR - local < half_band {
            ((camera + 1) % SIDE_CAMERAS, (local - SECTOR) / SECTOR, SECTOR - local)
        } else {
            return own;
        };

        let other = self.textures.sample(neighbour, neighbour_s, t);
        let w = 0.5 + 0.5 * distance / half_band;
        [0, 1, 2].map(|c| own[c] * w + other[c] * (1.0 - w))
    }

    /// Apply pitch, then yaw, then roll to a view ray.
    fn rotate(&self, [x, y, z]: [f64; 3]) -> [f64; 3] {
        let (sp, cp) = self.rotation.x.sin_cos();
        let (y, z) = (y * cp - z * sp, y * sp + z * cp);
        let (sy, cy) = self.rotation.y.sin_cos();
        let (x, z) = (x * cy + z * sy, -x * sy + z * cy);
        let (sr, cr) = self.rotation.z.sin_cos();
        let (x, y) = (x * cr - y * sr, x * sr + y * cr);
        [x, y, z]
    }
}
