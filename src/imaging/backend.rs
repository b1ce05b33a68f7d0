//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: decode, resize and encode. The size-fitting controller only ever
//! talks to this trait, so its search logic is testable with a recording
//! mock.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the pure-Rust `image`
//! crate codecs.

use super::params::{OutputFormat, Quality, ResampleFilter};
use image::{ColorType, DynamicImage, ImageBuffer, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single codec stage. The variant is the stage tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Resize failed: {0}")]
    Resize(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Channel layout of a [`PixelBuffer`]. All layouts are 8 bits per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    L8,
    La8,
    Rgb8,
    Rgba8,
}

impl ChannelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::L8 => 1,
            Self::La8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::La8 | Self::Rgba8)
    }

    pub fn color_type(self) -> ColorType {
        match self {
            Self::L8 => ColorType::L8,
            Self::La8 => ColorType::La8,
            Self::Rgb8 => ColorType::Rgb8,
            Self::Rgba8 => ColorType::Rgba8,
        }
    }
}

/// Decoded raster: the pivot between resize and encode.
///
/// Invariant: `data.len() == width * height * layout.channels()`. Use
/// [`PixelBuffer::check_geometry`] before handing an externally built buffer
/// to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reject zero-sized buffers and sample data that disagrees with the
    /// declared geometry.
    pub fn check_geometry(&self) -> Result<(), BackendError> {
        if self.width == 0 || self.height == 0 {
            return Err(BackendError::Resize(format!(
                "invalid geometry {}x{}",
                self.width, self.height
            )));
        }
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(self.layout.channels()))
            .ok_or_else(|| BackendError::Resize("buffer size overflows usize".into()))?;
        if self.data.len() != expected {
            return Err(BackendError::Resize(format!(
                "buffer holds {} bytes, {}x{} {:?} needs {}",
                self.data.len(),
                self.width,
                self.height,
                self.layout,
                expected
            )));
        }
        Ok(())
    }

    /// Take ownership of a decoded image, normalising to an 8-bit layout.
    ///
    /// 16-bit and float images keep their alpha channel if they have one.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (layout, data) = match image {
            DynamicImage::ImageLuma8(buf) => (ChannelLayout::L8, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (ChannelLayout::La8, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (ChannelLayout::Rgb8, buf.into_raw()),
            DynamicImage::ImageRgba8(buf) => (ChannelLayout::Rgba8, buf.into_raw()),
            other if other.color().has_alpha() => {
                (ChannelLayout::Rgba8, other.to_rgba8().into_raw())
            }
            other => (ChannelLayout::Rgb8, other.to_rgb8().into_raw()),
        };
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// Hand the samples back to the `image` crate without copying.
    pub fn into_dynamic(self) -> Result<DynamicImage, BackendError> {
        let (w, h) = (self.width, self.height);
        let mismatch = || BackendError::Resize(format!("sample buffer does not match {w}x{h}"));
        let image = match self.layout {
            ChannelLayout::L8 => DynamicImage::ImageLuma8(
                ImageBuffer::from_raw(w, h, self.data).ok_or_else(mismatch)?,
            ),
            ChannelLayout::La8 => DynamicImage::ImageLumaA8(
                ImageBuffer::from_raw(w, h, self.data).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgb8 => DynamicImage::ImageRgb8(
                ImageBuffer::from_raw(w, h, self.data).ok_or_else(mismatch)?,
            ),
            ChannelLayout::Rgba8 => DynamicImage::ImageRgba8(
                ImageBuffer::from_raw(w, h, self.data).ok_or_else(mismatch)?,
            ),
        };
        Ok(image)
    }
}

/// Result of a decode: the raster plus the container it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub buffer: PixelBuffer,
    pub format: ImageFormat,
}

/// Safety ceiling applied before and during decode.
///
/// Header dimensions are checked before any pixel allocation, so a corrupt or
/// malicious header cannot trigger an unbounded allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_alloc_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: 16_384,
            max_height: 16_384,
            max_alloc_bytes: 512 * 1024 * 1024,
        }
    }
}

impl DecodeLimits {
    /// Check header dimensions against the ceiling.
    pub fn check(&self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Decode(format!(
                "image header declares empty geometry {width}x{height}"
            )));
        }
        if width > self.max_width || height > self.max_height {
            return Err(BackendError::Decode(format!(
                "image is {width}x{height}, limit is {}x{}",
                self.max_width, self.max_height
            )));
        }
        // Footprint of the normalised RGBA8 raster
        let estimated = width as u64 * height as u64 * 4;
        if estimated > self.max_alloc_bytes {
            return Err(BackendError::Decode(format!(
                "decoding {width}x{height} needs ~{:.1} MB, limit is {:.1} MB",
                estimated as f64 / 1024.0 / 1024.0,
                self.max_alloc_bytes as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    pub fn to_image_limits(self) -> image::Limits {
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.max_width);
        limits.max_image_height = Some(self.max_height);
        limits.max_alloc = Some(self.max_alloc_bytes);
        limits
    }
}

/// Trait for image codec backends.
///
/// Every backend must implement all three operations so the controller is
/// backend-agnostic. `Sync` is required because the host shares one backend
/// across worker threads.
pub trait ImageBackend: Sync {
    /// Decode raw bytes. `declared_mime` is only consulted when the content
    /// itself is not recognisable.
    fn decode(&self, bytes: &[u8], declared_mime: Option<&str>) -> Result<Decoded, BackendError>;

    /// Resample `buffer` to exactly `width` x `height`.
    fn resize(
        &self,
        buffer: PixelBuffer,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<PixelBuffer, BackendError>;

    /// Serialize `buffer` into `format`. Must be deterministic.
    fn encode(
        &self,
        buffer: &PixelBuffer,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
