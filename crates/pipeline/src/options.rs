//! Option resolution.
//!
//! Every option arrives as an optional raw string. Parsing never fails except
//! for a missing source path: bad values fall back to a default and leave a
//! [`ConfigWarning`] behind for the caller to report.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use omniexport_common::{ExportDefaults, OmniexportError, OmniexportResult};
use omniexport_engine::{ColorProcessingMethod, ImageFileFormat, MeshRotation, RenderOptions};

const MULTI_CAMERA_TOKEN: &str = "6processed";

/// Option values exactly as given on the command line, keyed by flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOptions {
    /// `-i`
    pub source: Option<String>,
    /// `-o`
    pub output: Option<String>,
    /// `-r`
    pub frame_range: Option<String>,
    /// `-w`
    pub resolution: Option<String>,
    /// `-t`
    pub render_type: Option<String>,
    /// `-f`
    pub format: Option<String>,
    /// `-c`
    pub color: Option<String>,
    /// `-b`
    pub blending_width: Option<String>,
    /// `-s`
    pub software_rendering: Option<String>,
    /// `-k`
    pub anti_aliasing: Option<String>,
    /// `-a`
    pub falloff: Option<String>,
    /// `-z`
    pub stabilization: Option<String>,
    /// `-x`
    pub export_type: Option<String>,
    /// `-q`
    pub rotation: Option<String>,
    /// `-v`
    pub falloff_value: Option<String>,
}

/// What gets written per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// One stitched image per frame.
    #[default]
    Panorama,
    /// One image per camera per frame.
    MultiCamera,
}

/// Frames to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameSelector {
    #[default]
    All,
    /// Inclusive, zero-based.
    Range { start: u32, end: u32 },
}

/// Requested output projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderType {
    #[default]
    Panorama,
    Dome,
    Spherical,
    /// Rectified image of one camera.
    Rectify(u8),
}

impl RenderType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "pano" => Some(Self::Panorama),
            "dome" => Some(Self::Dome),
            "spherical" => Some(Self::Spherical),
            other => other
                .strip_prefix("rectify-")
                .and_then(|n| n.parse::<u8>().ok())
                .filter(|n| (*n as usize) < omniexport_engine::CAMERA_COUNT)
                .map(Self::Rectify),
        }
    }
}

/// Panorama orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    /// Pitch.
    pub front: f64,
    /// Yaw.
    pub down: f64,
}

impl Rotation {
    pub fn is_zero(&self) -> bool {
        self.front == 0.0 && self.down == 0.0
    }

    pub fn to_mesh_rotation(self) -> MeshRotation {
        MeshRotation::from_degrees(self.front, self.down)
    }
}

/// Lens falloff correction settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FalloffCorrection {
    pub enabled: bool,
    pub attenuation: f32,
}

/// Validated, immutable export configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source: PathBuf,

    /// Output directory; file names are appended to it.
    pub output_prefix: PathBuf,

    pub frames: FrameSelector,

    /// Panorama size. Unused in multi-camera mode.
    pub width: u32,
    pub height: u32,

    pub mode: ExportMode,
    pub render_type: RenderType,
    pub format: ImageFileFormat,
    pub color_method: ColorProcessingMethod,
    pub blending_width: u32,

    /// Unused in multi-camera mode.
    pub rotation: Rotation,

    pub render_options: RenderOptions,
    pub falloff: FalloffCorrection,
}

/// A value that could not be used as given.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigWarning {
    #[error("Invalid resolution '{value}', using {width}x{height}")]
    InvalidResolution { value: String, width: u32, height: u32 },

    #[error("Configured default resolution {width}x{height} is invalid, using {fallback_width}x{fallback_height}")]
    InvalidDefaultResolution {
        width: u32,
        height: u32,
        fallback_width: u32,
        fallback_height: u32,
    },

    #[error("Invalid frame range '{value}', processing all frames")]
    InvalidFrameRange { value: String },

    #[error("Unknown export type '{value}', use '6processed'")]
    UnknownExportType { value: String },

    #[error("Unknown output format '{value}', using jpg")]
    UnknownFormat { value: String },

    #[error("Unknown color processing method '{value}', using hq")]
    UnknownColorMethod { value: String },

    #[error("Invalid blending width '{value}', using {fallback}")]
    InvalidBlendingWidth { value: String, fallback: u32 },

    #[error("Invalid falloff value '{value}', using {fallback}")]
    InvalidFalloffValue { value: String, fallback: f32 },

    #[error("Render type '{value}' is not supported, producing a panorama")]
    UnsupportedRenderType { value: String },
}

/// Configuration plus the warnings raised while building it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// Parse `WIDTHxHEIGHT`, splitting on the first `x` (else the first `X`).
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x').or_else(|| value.split_once('X'))?;
    let width = w.trim().parse::<u32>().ok().filter(|w| *w > 0)?;
    let height = h.trim().parse::<u32>().ok().filter(|h| *h > 0)?;
    Some((width, height))
}

/// Parse `START-END`, splitting on the first `-`.
pub fn parse_frame_range(value: &str) -> Option<(u32, u32)> {
    let (start, end) = value.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

fn front_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)Front\s+(-?\d+\.?\d*)").ok())
        .as_ref()
}

fn down_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)-?Down\s+(-?\d+\.?\d*)").ok())
        .as_ref()
}

fn capture_angle(pattern: Option<&Regex>, value: &str) -> f64 {
    pattern
        .and_then(|p| p.captures(value))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// Parse `Front <deg> -Down <deg>`. Either part may be missing; anything
/// that does not match reads as zero.
pub fn parse_rotation(value: &str) -> Rotation {
    Rotation {
        front: capture_angle(front_pattern(), value),
        down: capture_angle(down_pattern(), value),
    }
}

/// Whether `value` starts with `true`, ignoring case.
pub fn parse_flag(value: &str) -> bool {
    starts_with_ignore_case(value, "true")
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Builds a [`PipelineConfig`] from raw options on top of file defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    defaults: ExportDefaults,
}

impl ConfigResolver {
    pub fn new(defaults: ExportDefaults) -> Self {
        Self { defaults }
    }

    /// Resolve `raw` into a configuration.
    ///
    /// Only a missing source path is an error; it is reported before any
    /// other option is looked at.
    pub fn resolve(&self, raw: &RawOptions) -> OmniexportResult<ResolvedConfig> {
        let source = non_empty(&raw.source)
            .map(PathBuf::from)
            .ok_or_else(|| OmniexportError::config("input stream not specified, use -i <file>"))?;

        let mut warnings = Vec::new();
        let defaults = &self.defaults;

        let output_prefix = non_empty(&raw.output)
            .map(PathBuf::from)
            .unwrap_or_else(|| defaults.output_prefix.clone());

        let frames = match raw.frame_range.as_deref() {
            None => FrameSelector::All,
            Some(value) => match parse_frame_range(value) {
                Some((start, end)) => FrameSelector::Range { start, end },
                None => {
                    warnings.push(ConfigWarning::InvalidFrameRange {
                        value: value.to_string(),
                    });
                    FrameSelector::All
                }
            },
        };

        let default_size = if defaults.width > 0 && defaults.height > 0 {
            (defaults.width, defaults.height)
        } else {
            let builtin = ExportDefaults::default();
            warnings.push(ConfigWarning::InvalidDefaultResolution {
                width: defaults.width,
                height: defaults.height,
                fallback_width: builtin.width,
                fallback_height: builtin.height,
            });
            (builtin.width, builtin.height)
        };

        let (width, height) = match raw.resolution.as_deref() {
            None => default_size,
            Some(value) => parse_resolution(value).unwrap_or_else(|| {
                warnings.push(ConfigWarning::InvalidResolution {
                    value: value.to_string(),
                    width: default_size.0,
                    height: default_size.1,
                });
                default_size
            }),
        };

        let mode = match non_empty(&raw.export_type) {
            None => ExportMode::Panorama,
            Some(value) if starts_with_ignore_case(value, MULTI_CAMERA_TOKEN) => {
                ExportMode::MultiCamera
            }
            Some(value) => {
                warnings.push(ConfigWarning::UnknownExportType {
                    value: value.to_string(),
                });
                ExportMode::Panorama
            }
        };

        let render_type = match non_empty(&raw.render_type) {
            None => RenderType::Panorama,
            Some(value) => match RenderType::from_token(value) {
                Some(RenderType::Panorama) => RenderType::Panorama,
                other => {
                    warnings.push(ConfigWarning::UnsupportedRenderType {
                        value: value.to_string(),
                    });
                    other.unwrap_or_default()
                }
            },
        };

        let format_token = raw.format.as_deref().unwrap_or(defaults.format.as_str());
        let format = ImageFileFormat::from_token(format_token).unwrap_or_else(|| {
            warnings.push(ConfigWarning::UnknownFormat {
                value: format_token.to_string(),
            });
            ImageFileFormat::Jpeg
        });

        let color_token = raw.color.as_deref().unwrap_or(defaults.color_processing.as_str());
        let color_method = ColorProcessingMethod::from_token(color_token).unwrap_or_else(|| {
            warnings.push(ConfigWarning::UnknownColorMethod {
                value: color_token.to_string(),
            });
            ColorProcessingMethod::HighQualityLinear
        });

        let blending_width = match raw.blending_width.as_deref() {
            None => defaults.blending_width,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                warnings.push(ConfigWarning::InvalidBlendingWidth {
                    value: value.to_string(),
                    fallback: defaults.blending_width,
                });
                defaults.blending_width
            }),
        };

        let attenuation = match raw.falloff_value.as_deref() {
            None => defaults.falloff_value,
            Some(value) => value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or_else(|| {
                    warnings.push(ConfigWarning::InvalidFalloffValue {
                        value: value.to_string(),
                        fallback: defaults.falloff_value,
                    });
                    defaults.falloff_value
                }),
        };

        let flag = |value: &Option<String>| value.as_deref().is_some_and(parse_flag);

        let config = PipelineConfig {
            source,
            output_prefix,
            frames,
            width,
            height,
            mode,
            render_type,
            format,
            color_method,
            blending_width,
            rotation: raw.rotation.as_deref().map(parse_rotation).unwrap_or_default(),
            render_options: RenderOptions {
                software_rendering: flag(&raw.software_rendering),
                anti_aliasing: flag(&raw.anti_aliasing),
                stabilization: flag(&raw.stabilization),
            },
            falloff: FalloffCorrection {
                enabled: flag(&raw.falloff),
                attenuation,
            },
        };

        Ok(ResolvedConfig { config, warnings })
    }
}
