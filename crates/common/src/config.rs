//! Application configuration.
//!
//! The config file only supplies defaults. Command-line values always win.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::OmniexportResult;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "OMNIEXPORT_CONFIG";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults applied before command-line options are resolved.
    pub defaults: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output directory used when `-o` is absent.
    pub output_prefix: PathBuf,

    /// Panorama width in pixels.
    pub width: u32,

    /// Panorama height in pixels.
    pub height: u32,

    /// Output image format token (`jpg`, `png`, ...).
    pub format: String,

    /// Debayering method token (`hq`, `down4`, ...).
    pub color_processing: String,

    /// Stitching overlap width in pixels.
    pub blending_width: u32,

    /// Falloff correction attenuation.
    pub falloff_value: f32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "omniexport_pipeline=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path. Logs go to stdout when unset.
    pub file: Option<PathBuf>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_prefix: PathBuf::from("ladybugImageOutput"),
            width: 2048,
            height: 1024,
            format: "jpg".to_string(),
            color_processing: "hq".to_string(),
            blending_width: 100,
            falloff_value: 1.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Path of the config file: `$OMNIEXPORT_CONFIG` or the standard location.
    pub fn path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(config_file_path)
    }

    /// Load config from an explicit path. A missing file yields defaults; an
    /// unreadable or malformed one is an error the caller may downgrade.
    pub fn load_from(config_path: &Path) -> OmniexportResult<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("omniexport").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.defaults.width, 2048);
        assert_eq!(config.defaults.height, 1024);
        assert_eq!(config.defaults.format, "jpg");
        assert_eq!(config.defaults.blending_width, 100);
        assert_eq!(
            config.defaults.output_prefix,
            PathBuf::from("ladybugImageOutput")
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "defaults": { "format": "png", "blending_width": 40 } }"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.defaults.format, "png");
        assert_eq!(config.defaults.blending_width, 40);
        assert_eq!(config.defaults.width, 2048);
        assert!(!config.logging.json);
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, crate::OmniexportError::Json(_)));
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from(dir.path()).unwrap_err();
        assert!(matches!(err, crate::OmniexportError::Io(_)));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.defaults.height, 1024);
    }
}
