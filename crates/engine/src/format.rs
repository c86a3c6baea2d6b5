//! Pixel, sensor and file format enums.

use serde::{Deserialize, Serialize};

/// Native sensor data format recorded in a stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Raw8,
    Jpeg8,
    ColorSepRaw8,
    ColorSepJpeg8,
    HalfHeightRaw8,
    ColorSepHalfHeightJpeg8,
    Raw12,
    HalfHeightRaw12,
    ColorSepJpeg12,
    ColorSepHalfHeightJpeg12,
    ColorSepJpeg12Processed,
    ColorSepHalfHeightJpeg12Processed,
    Raw16,
    HalfHeightRaw16,
}

impl DataFormat {
    /// Whether samples carry 12 or 16 significant bits.
    pub fn is_high_bit_depth(self) -> bool {
        matches!(
            self,
            Self::Raw12
                | Self::HalfHeightRaw12
                | Self::ColorSepJpeg12
                | Self::ColorSepHalfHeightJpeg12
                | Self::ColorSepJpeg12Processed
                | Self::ColorSepHalfHeightJpeg12Processed
                | Self::Raw16
                | Self::HalfHeightRaw16
        )
    }

    /// Pixel format that converted frames of this data format are written in.
    pub fn converted_pixel_format(self) -> PixelFormat {
        if self.is_high_bit_depth() {
            PixelFormat::Bgru16
        } else {
            PixelFormat::Bgru
        }
    }

    /// Bytes per stored sensor sample.
    pub fn sample_bytes(self) -> usize {
        if self.is_high_bit_depth() {
            2
        } else {
            1
        }
    }
}

/// Layout of a decoded pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit blue, green, red, unused.
    Bgru,
    /// 16-bit little-endian blue, green, red, unused.
    Bgru16,
    /// 8-bit blue, green, red.
    Bgr,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgru => 4,
            Self::Bgru16 => 8,
            Self::Bgr => 3,
        }
    }

    pub fn is_16_bit(self) -> bool {
        matches!(self, Self::Bgru16)
    }
}

/// Debayering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorProcessingMethod {
    #[default]
    HighQualityLinear,
    EdgeSensing,
    NearestNeighbor,
    /// Halves width and height.
    Downsample4,
    /// Quarters width and height.
    Downsample16,
    Monochrome,
}

impl ColorProcessingMethod {
    /// Parse a command-line token. Returns `None` for unknown tokens.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "hq" | "hq-gpu" => Some(Self::HighQualityLinear),
            "edge" => Some(Self::EdgeSensing),
            "near" | "near-f" => Some(Self::NearestNeighbor),
            "down4" => Some(Self::Downsample4),
            "down16" => Some(Self::Downsample16),
            "mono" => Some(Self::Monochrome),
            _ => None,
        }
    }

    /// Linear reduction applied to both image dimensions.
    pub fn downsample_divisor(self) -> u32 {
        match self {
            Self::Downsample4 => 2,
            Self::Downsample16 => 4,
            _ => 1,
        }
    }
}

/// Encoded image file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFileFormat {
    Bmp,
    #[default]
    Jpeg,
    Tiff,
    Png,
}

impl ImageFileFormat {
    /// Parse a command-line token (case-insensitive). `jpeg` and `jpg` are
    /// the same format.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "bmp" => Some(Self::Bmp),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tiff" => Some(Self::Tiff),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Jpeg => "jpg",
            Self::Tiff => "tiff",
            Self::Png => "png",
        }
    }

    /// Whether the encoder can store 16 bits per channel.
    pub fn supports_16_bit(self) -> bool {
        matches!(self, Self::Tiff | Self::Png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bit_depth_formats_convert_to_bgru16() {
        assert_eq!(DataFormat::Raw12.converted_pixel_format(), PixelFormat::Bgru16);
        assert_eq!(
            DataFormat::ColorSepHalfHeightJpeg12Processed.converted_pixel_format(),
            PixelFormat::Bgru16
        );
        assert_eq!(DataFormat::Raw8.converted_pixel_format(), PixelFormat::Bgru);
        assert_eq!(DataFormat::ColorSepJpeg8.sample_bytes(), 1);
        assert_eq!(DataFormat::Raw16.sample_bytes(), 2);
    }

    #[test]
    fn color_tokens_map_to_methods() {
        assert_eq!(
            ColorProcessingMethod::from_token("hq-gpu"),
            Some(ColorProcessingMethod::HighQualityLinear)
        );
        assert_eq!(
            ColorProcessingMethod::from_token("near-f"),
            Some(ColorProcessingMethod::NearestNeighbor)
        );
        assert_eq!(ColorProcessingMethod::from_token("bilinear"), None);
        assert_eq!(ColorProcessingMethod::Downsample4.downsample_divisor(), 2);
        assert_eq!(ColorProcessingMethod::Downsample16.downsample_divisor(), 4);
        assert_eq!(ColorProcessingMethod::Monochrome.downsample_divisor(), 1);
    }

    #[test]
    fn jpeg_token_uses_jpg_extension() {
        assert_eq!(ImageFileFormat::from_token("jpeg"), Some(ImageFileFormat::Jpeg));
        assert_eq!(ImageFileFormat::from_token("PNG"), Some(ImageFileFormat::Png));
        assert_eq!(ImageFileFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFileFormat::from_token("gif"), None);
    }
}
