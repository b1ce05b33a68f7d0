//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are shared by the
//! [`compress`](crate::compress) controller (which decides which quality and
//! geometry to try next) and the [`backend`](super::backend) (which does the
//! pixel work), so a mock backend can be swapped in without touching the
//! search logic.
//!
//! ## Types
//!
//! - [`Quality`]: Encoder fidelity in `(0, 1]`. Clamped on construction.
//! - [`OutputFormat`]: Container the encoder writes (JPEG, PNG, lossless WebP).
//! - [`ResampleFilter`]: Downscaling filter. Nearest-neighbour is not
//!   representable.

use image::ImageFormat;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest quality the encoder accepts. Anything lower is clamped up.
pub const MIN_QUALITY: f32 = 0.01;

/// Encoder fidelity in `(0, 1]`, where `1.0` is best fidelity / largest output.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub const MAX: Quality = Quality(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::MAX;
        }
        Self(value.clamp(MIN_QUALITY, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1–100 scale used by the JPEG encoder.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Output container written by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    /// Lossless WebP (the pure-Rust encoder has no lossy mode).
    #[serde(rename = "webp")]
    WebP,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// Whether the quality parameter changes the encoded output.
    ///
    /// Lossless formats ignore quality, so the search makes exactly one
    /// attempt per geometry for them.
    pub fn has_quality_dial(self) -> bool {
        matches!(self, Self::Jpeg)
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// The output format that keeps the source in its own format family.
    ///
    /// TIFF has no web-friendly lossless counterpart here, so it maps to JPEG.
    pub fn for_source(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => Self::Png,
            ImageFormat::WebP => Self::WebP,
            _ => Self::Jpeg,
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            other => Err(format!(
                "unknown output format '{other}' (expected jpeg, png or webp)"
            )),
        }
    }
}

/// Resampling filter used when downscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    /// Bicubic (Catmull-Rom spline).
    #[default]
    CatmullRom,
    Lanczos3,
    /// Bilinear. Cheapest filter that still averages neighbouring samples.
    Triangle,
}

impl ResampleFilter {
    pub fn to_filter_type(self) -> FilterType {
        match self {
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
            Self::Triangle => FilterType::Triangle,
        }
    }
}

impl FromStr for ResampleFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "catmull-rom" | "bicubic" => Ok(Self::CatmullRom),
            "lanczos3" => Ok(Self::Lanczos3),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            other => Err(format!(
                "unknown resample filter '{other}' (expected catmull-rom, lanczos3 or triangle)"
            )),
        }
    }
}
