//! Command-line surface.
//!
//! The flag set is single-letter and every flag takes a value. Before clap
//! sees argv, [`sanitize_args`] drops anything it would reject so that a typo
//! costs a warning instead of the whole run.

use clap::Parser;

use omniexport_pipeline::RawOptions;

/// Flags that take a value.
const VALUE_FLAGS: &[&str] = &[
    "-i", "-o", "-r", "-w", "-t", "-f", "-c", "-b", "-s", "-k", "-a", "-z", "-x", "-q", "-v",
];

/// Flags that stand alone.
const SWITCHES: &[&str] = &["-h", "--help", "-V", "--version", "--verbose", "--log-json"];

#[derive(Parser, Debug)]
#[command(
    name = "omniexport",
    about = "Export panoramas or per-camera images from a six-camera stream",
    version,
    author,
    args_override_self = true,
    after_help = "Examples:\n  \
        omniexport -i stream.omx -o output -t pano -f jpg -c hq\n  \
        omniexport -i stream.omx -o output -x 6processed -f png\n  \
        omniexport -i stream.omx -o output -q \"Front 5 -Down 0\""
)]
pub struct Cli {
    /// Input stream file
    #[arg(short = 'i', value_name = "FILE", allow_hyphen_values = true)]
    pub input: Option<String>,

    /// Output directory; files are named <frame>.<ext> or <frame>_cam<N>.<ext>
    #[arg(short = 'o', value_name = "DIR", allow_hyphen_values = true)]
    pub output: Option<String>,

    /// Frames to export, START-END inclusive (default: all)
    #[arg(short = 'r', value_name = "START-END", allow_hyphen_values = true)]
    pub frames: Option<String>,

    /// Panorama resolution (default: 2048x1024)
    #[arg(short = 'w', value_name = "WxH", allow_hyphen_values = true)]
    pub resolution: Option<String>,

    /// Render type: pano, dome, spherical, rectify-0..5 (only pano is produced)
    #[arg(short = 't', value_name = "TYPE", allow_hyphen_values = true)]
    pub render_type: Option<String>,

    /// Output format: bmp, jpg, tiff, png
    #[arg(short = 'f', value_name = "FORMAT", allow_hyphen_values = true)]
    pub format: Option<String>,

    /// Debayering: hq, hq-gpu, edge, near, near-f, down4, down16, mono
    #[arg(short = 'c', value_name = "METHOD", allow_hyphen_values = true)]
    pub color: Option<String>,

    /// Blending width in pixels (default: 100)
    #[arg(short = 'b', value_name = "PIXELS", allow_hyphen_values = true)]
    pub blending: Option<String>,

    /// Software rendering (true/false)
    #[arg(short = 's', value_name = "BOOL", allow_hyphen_values = true)]
    pub software_rendering: Option<String>,

    /// Anti-aliasing (true/false)
    #[arg(short = 'k', value_name = "BOOL", allow_hyphen_values = true)]
    pub anti_aliasing: Option<String>,

    /// Falloff correction (true/false)
    #[arg(short = 'a', value_name = "BOOL", allow_hyphen_values = true)]
    pub falloff: Option<String>,

    /// Stabilization (true/false)
    #[arg(short = 'z', value_name = "BOOL", allow_hyphen_values = true)]
    pub stabilization: Option<String>,

    /// Export type; 6processed writes every camera separately
    #[arg(short = 'x', value_name = "TYPE", allow_hyphen_values = true)]
    pub export_type: Option<String>,

    /// Panorama rotation, e.g. "Front 5 -Down 0"
    #[arg(short = 'q', value_name = "ROTATION", allow_hyphen_values = true)]
    pub rotation: Option<String>,

    /// Falloff correction attenuation (default: 1.0)
    #[arg(short = 'v', value_name = "VALUE", allow_hyphen_values = true)]
    pub falloff_value: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn raw_options(&self) -> RawOptions {
        RawOptions {
            source: self.input.clone(),
            output: self.output.clone(),
            frame_range: self.frames.clone(),
            resolution: self.resolution.clone(),
            render_type: self.render_type.clone(),
            format: self.format.clone(),
            color: self.color.clone(),
            blending_width: self.blending.clone(),
            software_rendering: self.software_rendering.clone(),
            anti_aliasing: self.anti_aliasing.clone(),
            falloff: self.falloff.clone(),
            stabilization: self.stabilization.clone(),
            export_type: self.export_type.clone(),
            rotation: self.rotation.clone(),
            falloff_value: self.falloff_value.clone(),
        }
    }
}

/// A token dropped by [`sanitize_args`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgWarning {
    /// Looked like a flag and had a value after it, but is not a flag we know.
    #[error("Unknown option '{0}' ignored")]
    UnknownOption(String),
    /// Anything else that could not be used.
    #[error("Unknown argument '{0}' ignored")]
    UnknownArgument(String),
}

/// Filter argv down to tokens clap will accept.
///
/// An unknown flag is dropped on its own, so the token after it is examined
/// again rather than swallowed as its value. The first element is kept as the
/// program name.
pub fn sanitize_args<I>(args: I) -> (Vec<String>, Vec<ArgWarning>)
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut kept: Vec<String> = args.next().into_iter().collect();
    let rest: Vec<String> = args.collect();
    let mut warnings = Vec::new();

    let mut i = 0;
    while i < rest.len() {
        let arg = rest[i].as_str();
        if arg == "-?" {
            kept.push("--help".to_string());
            i += 1;
        } else if SWITCHES.contains(&arg) {
            kept.push(arg.to_string());
            i += 1;
        } else if arg.len() >= 2 && arg.starts_with('-') && i + 1 < rest.len() {
            if VALUE_FLAGS.contains(&arg) {
                kept.push(arg.to_string());
                kept.push(rest[i + 1].clone());
                i += 2;
            } else {
                warnings.push(ArgWarning::UnknownOption(arg.to_string()));
                i += 1;
            }
        } else {
            warnings.push(ArgWarning::UnknownArgument(arg.to_string()));
            i += 1;
        }
    }

    (kept, warnings)
}
