//! Pure Rust codec backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` under [`DecodeLimits`] |
//! | Resize | `DynamicImage::resize_exact` with the configured [`ResampleFilter`] |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |

use super::backend::{BackendError, DecodeLimits, Decoded, ImageBackend, PixelBuffer};
use super::params::{OutputFormat, Quality, ResampleFilter};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// Input containers whose decoders are compiled in.
const SUPPORTED_INPUTS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Tiff,
];

/// Whether `format` can be decoded by [`RustBackend`].
pub fn is_supported_input(format: ImageFormat) -> bool {
    SUPPORTED_INPUTS.contains(&format) && format.reading_enabled()
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Default)]
pub struct RustBackend {
    limits: DecodeLimits,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self { limits }
    }
}

/// Identify the container: sniff the content first, fall back to the
/// declared MIME type.
fn detect_format(bytes: &[u8], declared_mime: Option<&str>) -> Result<ImageFormat, BackendError> {
    let format = image::guess_format(bytes)
        .ok()
        .or_else(|| declared_mime.and_then(ImageFormat::from_mime_type))
        .ok_or_else(|| BackendError::Decode("unrecognised image data".to_string()))?;

    if !is_supported_input(format) {
        return Err(BackendError::Decode(format!(
            "unsupported input format: {format:?}"
        )));
    }
    Ok(format)
}

fn encode_jpeg(buffer: &PixelBuffer, quality: Quality) -> Result<Vec<u8>, BackendError> {
    if buffer.layout.has_alpha() {
        return Err(BackendError::Encode(format!(
            "JPEG cannot store channel layout {:?}",
            buffer.layout
        )));
    }
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.percent())
        .write_image(
            &buffer.data,
            buffer.width,
            buffer.height,
            buffer.layout.color_type().into(),
        )
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive)
        .write_image(
            &buffer.data,
            buffer.width,
            buffer.height,
            buffer.layout.color_type().into(),
        )
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

fn encode_webp(buffer: &PixelBuffer) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .write_image(
            &buffer.data,
            buffer.width,
            buffer.height,
            buffer.layout.color_type().into(),
        )
        .map_err(|e| BackendError::Encode(format!("WebP encode failed: {e}")))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8], declared_mime: Option<&str>) -> Result<Decoded, BackendError> {
        let format = detect_format(bytes, declared_mime)?;

        // Header-only read so oversized images are rejected before allocation
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("cannot read image header: {e}")))?;
        self.limits.check(width, height)?;

        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(self.limits.to_image_limits());
        let image = reader
            .decode()
            .map_err(|e| BackendError::Decode(format!("{format:?} decode failed: {e}")))?;

        Ok(Decoded {
            buffer: PixelBuffer::from_dynamic(image),
            format,
        })
    }

    fn resize(
        &self,
        buffer: PixelBuffer,
        width: u32,
        height: u32,
        filter: ResampleFilter,
    ) -> Result<PixelBuffer, BackendError> {
        buffer.check_geometry()?;
        if width == 0 || height == 0 {
            return Err(BackendError::Resize(format!(
                "invalid target geometry {width}x{height}"
            )));
        }
        let image = buffer.into_dynamic()?;
        let resized = image.resize_exact(width, height, filter.to_filter_type());
        Ok(PixelBuffer::from_dynamic(resized))
    }

    fn encode(
        &self,
        buffer: &PixelBuffer,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        buffer
            .check_geometry()
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        match format {
            OutputFormat::Jpeg => encode_jpeg(buffer, quality),
            OutputFormat::Png => encode_png(buffer),
            OutputFormat::WebP => encode_webp(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::ChannelLayout;

    /// Deterministic RGB test pattern with enough detail that JPEG quality
    /// visibly changes the output size.
    fn pattern(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 97;
                data.push(((x * 255) / width.max(1)) as u8 ^ noise as u8);
                data.push(((y * 255) / height.max(1)) as u8);
                data.push(((x + y) % 256) as u8 ^ (noise as u8).wrapping_mul(3));
            }
        }
        PixelBuffer {
            width,
            height,
            layout: ChannelLayout::Rgb8,
            data,
        }
    }

    fn encoded(buffer: &PixelBuffer, format: OutputFormat) -> Vec<u8> {
        RustBackend::new()
            .encode(buffer, format, Quality::MAX)
            .unwrap()
    }

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let backend = RustBackend::new();
        let bytes = encoded(&pattern(64, 48), OutputFormat::Jpeg);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = backend.decode(&bytes, Some("image/jpeg")).unwrap();
        assert_eq!(decoded.format, ImageFormat::Jpeg);
        assert_eq!(decoded.buffer.dimensions(), (64, 48));
        assert_eq!(decoded.buffer.layout, ChannelLayout::Rgb8);
    }

    #[test]
    fn png_decode_keeps_alpha() {
        let rgba = PixelBuffer {
            width: 8,
            height: 8,
            layout: ChannelLayout::Rgba8,
            data: vec![200; 8 * 8 * 4],
        };
        let bytes = encoded(&rgba, OutputFormat::Png);
        let decoded = RustBackend::new().decode(&bytes, None).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(decoded.buffer.layout, ChannelLayout::Rgba8);
    }

    #[test]
    fn decode_rejects_truncated_bytes() {
        let bytes = encoded(&pattern(64, 48), OutputFormat::Png);
        let result = RustBackend::new().decode(&bytes[..bytes.len() / 2], Some("image/png"));
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = RustBackend::new().decode(b"definitely not an image", Some("text/plain"));
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_rejects_headers_over_the_ceiling() {
        let bytes = encoded(&pattern(64, 48), OutputFormat::Png);
        let backend = RustBackend::with_limits(DecodeLimits {
            max_width: 32,
            max_height: 32,
            ..DecodeLimits::default()
        });
        let err = backend.decode(&bytes, None).unwrap_err();
        assert!(err.to_string().contains("limit is 32x32"), "{err}");
    }

    #[test]
    fn resize_produces_exact_geometry() {
        let resized = RustBackend::new()
            .resize(pattern(100, 50), 40, 20, ResampleFilter::CatmullRom)
            .unwrap();
        assert_eq!(resized.dimensions(), (40, 20));
        assert_eq!(resized.layout, ChannelLayout::Rgb8);
        assert!(resized.check_geometry().is_ok());
    }

    #[test]
    fn resize_rejects_zero_geometry() {
        let empty = PixelBuffer {
            width: 0,
            height: 0,
            layout: ChannelLayout::Rgb8,
            data: Vec::new(),
        };
        let result = RustBackend::new().resize(empty, 10, 10, ResampleFilter::default());
        assert!(matches!(result, Err(BackendError::Resize(_))));
    }

    #[test]
    fn jpeg_rejects_alpha_layouts() {
        let rgba = PixelBuffer {
            width: 4,
            height: 4,
            layout: ChannelLayout::Rgba8,
            data: vec![0; 64],
        };
        let result = RustBackend::new().encode(&rgba, OutputFormat::Jpeg, Quality::MAX);
        assert!(matches!(result, Err(BackendError::Encode(_))));
    }

    #[test]
    fn encoding_is_deterministic() {
        let backend = RustBackend::new();
        let buffer = pattern(96, 64);
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP] {
            let a = backend.encode(&buffer, format, Quality::new(0.7)).unwrap();
            let b = backend.encode(&buffer, format, Quality::new(0.7)).unwrap();
            assert_eq!(a, b, "{format} output differs between runs");
        }
    }

    #[test]
    fn jpeg_size_grows_with_quality() {
        let backend = RustBackend::new();
        let buffer = pattern(256, 192);
        let sizes: Vec<usize> = [0.3, 0.6, 0.9, 1.0]
            .into_iter()
            .map(|q| {
                backend
                    .encode(&buffer, OutputFormat::Jpeg, Quality::new(q))
                    .unwrap()
                    .len()
            })
            .collect();
        assert!(
            sizes.windows(2).all(|w| w[0] <= w[1]),
            "sizes not monotonic: {sizes:?}"
        );
    }

    #[test]
    fn lossless_formats_ignore_quality() {
        let backend = RustBackend::new();
        let buffer = pattern(64, 64);
        for format in [OutputFormat::Png, OutputFormat::WebP] {
            let high = backend.encode(&buffer, format, Quality::MAX).unwrap();
            let low = backend.encode(&buffer, format, Quality::new(0.1)).unwrap();
            assert_eq!(high.len(), low.len());
        }
    }
}
