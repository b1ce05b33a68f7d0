//! End-to-end compression against the real codecs with synthetic images.

use imgfit::config::{CompressionOptions, ProcessingConfig};
use imgfit::imaging::{
    ChannelLayout, ImageBackend, OutputFormat, PixelBuffer, Quality, RustBackend,
};
use imgfit::{FailureKind, Host, SourceImage, compress};

/// Smooth gradients with mild deterministic noise: compresses like a photo.
fn photo(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let noise = ((x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 24) as u8;
            data.push(((x * 200) / width) as u8 + noise);
            data.push(((y * 200) / height) as u8 + noise / 2);
            data.push((((x + y) * 160) / (width + height)) as u8 + noise);
        }
    }
    PixelBuffer {
        width,
        height,
        layout: ChannelLayout::Rgb8,
        data,
    }
}

fn encode(buffer: &PixelBuffer, format: OutputFormat, quality: f32) -> Vec<u8> {
    RustBackend::new()
        .encode(buffer, format, Quality::new(quality))
        .unwrap()
}

#[test]
fn large_jpeg_is_bounded_and_fits_default_budget() {
    let bytes = encode(&photo(2400, 1600), OutputFormat::Jpeg, 1.0);
    let source = SourceImage::new(bytes, Some("image/jpeg"));

    let result = compress(&source, &CompressionOptions::default()).unwrap();

    assert_eq!((result.width, result.height), (1024, 683));
    assert_eq!(result.format, OutputFormat::Jpeg);
    assert!(result.fits_budget);
    assert!(result.compressed_size_bytes <= 1_048_576);
    assert!(result.percentage_reduction().unwrap() > 0.0);
    assert_eq!(&result.bytes[..2], &[0xFF, 0xD8]);
}

#[test]
fn empty_input_is_invalid() {
    let source = SourceImage::new(Vec::new(), Some("image/png"));
    let err = compress(&source, &CompressionOptions::default()).unwrap_err();
    assert_eq!(err.kind(), FailureKind::InvalidInput);
}

#[test]
fn corrupt_input_is_a_decode_error() {
    let mut bytes = encode(&photo(64, 64), OutputFormat::Png, 1.0);
    bytes.truncate(bytes.len() / 3);
    let source = SourceImage::new(bytes, Some("image/png"));

    let err = compress(&source, &CompressionOptions::default()).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Decode);
}

#[test]
fn small_image_keeps_dimensions() {
    let bytes = encode(&photo(200, 150), OutputFormat::Png, 1.0);
    let source = SourceImage::new(bytes, Some("image/png"));

    let result = compress(&source, &CompressionOptions::default()).unwrap();

    assert_eq!((result.width, result.height), (200, 150));
    assert_eq!(result.format, OutputFormat::Png);
    assert!(result.attempts >= 1);
    assert!(result.fits_budget);
}

#[test]
fn unreachable_budget_stops_at_quality_floor() {
    let bytes = encode(&photo(256, 256), OutputFormat::Jpeg, 1.0);
    let source = SourceImage::new(bytes, Some("image/jpeg"));
    let options = CompressionOptions {
        max_size_bytes: 100,
        ..Default::default()
    };

    let result = compress(&source, &options).unwrap();

    assert!(!result.fits_budget);
    assert_eq!(result.attempts, 6);
    assert_eq!(result.quality.percent(), 50);
    assert!(result.compressed_size_bytes > 100);
}

#[test]
fn first_fitting_quality_is_chosen() {
    let buffer = photo(320, 240);
    // PNG round-trips losslessly, so the controller encodes the same raster
    let source = SourceImage::new(encode(&buffer, OutputFormat::Png, 1.0), Some("image/png"));
    let budget = encode(&buffer, OutputFormat::Jpeg, 0.7).len() as u64;
    let options = CompressionOptions {
        max_size_bytes: budget,
        output_format: Some(OutputFormat::Jpeg),
        ..Default::default()
    };

    let result = compress(&source, &options).unwrap();

    assert!(result.fits_budget);
    assert_eq!(result.quality.percent(), 70);
    assert_eq!(result.compressed_size_bytes, budget);
    assert_eq!(result.attempts, 4);
}

#[test]
fn tiff_source_becomes_jpeg() {
    let bytes = {
        let image = image::RgbImage::from_raw(64, 48, photo(64, 48).data).unwrap();
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Tiff).unwrap();
        out.into_inner()
    };
    let source = SourceImage::new(bytes, Some("image/tiff"));

    let result = compress(&source, &CompressionOptions::default()).unwrap();
    assert_eq!(result.format, OutputFormat::Jpeg);
    assert_eq!(result.mime_type(), "image/jpeg");
}

#[test]
fn tiff_with_alpha_becomes_png() {
    let rgba: Vec<u8> = photo(64, 48)
        .data
        .chunks_exact(3)
        .enumerate()
        .flat_map(|(i, px)| [px[0], px[1], px[2], (i % 256) as u8])
        .collect();
    let bytes = {
        let image = image::RgbaImage::from_raw(64, 48, rgba).unwrap();
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Tiff).unwrap();
        out.into_inner()
    };
    let source = SourceImage::new(bytes, Some("image/tiff"));

    let result = compress(&source, &CompressionOptions::default()).unwrap();
    assert_eq!(result.format, OutputFormat::Png);
    assert_eq!((result.width, result.height), (64, 48));
    assert!(result.fits_budget);
}

#[test]
fn lossless_png_is_downscaled_under_budget() {
    let bytes = encode(&photo(400, 300), OutputFormat::Png, 1.0);
    let budget = bytes.len() as u64 * 6 / 10;
    let source = SourceImage::new(bytes, Some("image/png"));
    let options = CompressionOptions {
        max_size_bytes: budget,
        ..Default::default()
    };

    let result = compress(&source, &options).unwrap();

    assert_eq!(result.format, OutputFormat::Png);
    assert!(result.fits_budget);
    assert!(result.downscale_rounds >= 1);
    assert!(result.width < 400);
    assert!(result.compressed_size_bytes <= budget);
}

#[test]
fn downscale_escalation_reaches_tight_budget() {
    let bytes = encode(&photo(800, 600), OutputFormat::Jpeg, 1.0);
    let source = SourceImage::new(bytes, Some("image/jpeg"));
    let mut options = CompressionOptions {
        max_size_bytes: 4_000,
        ..Default::default()
    };
    options.downscale.enabled = true;
    options.downscale.factor = 0.5;
    options.downscale.max_rounds = 6;

    let result = compress(&source, &options).unwrap();

    assert!(result.fits_budget);
    assert!(result.downscale_rounds >= 1);
    assert!(result.width < 800);
}

#[test]
fn host_runs_jobs_in_background() {
    let host = Host::new(&ProcessingConfig {
        max_workers: Some(2),
    })
    .unwrap();
    let handles: Vec<_> = [(300, 200), (200, 300), (128, 128)]
        .into_iter()
        .map(|(w, h)| {
            let bytes = encode(&photo(w, h), OutputFormat::Jpeg, 0.9);
            host.submit(
                SourceImage::new(bytes, Some("image/jpeg")),
                CompressionOptions::default(),
            )
        })
        .collect();

    let dims: Vec<(u32, u32)> = handles
        .into_iter()
        .map(|h| {
            let r = h.wait().unwrap();
            (r.width, r.height)
        })
        .collect();
    assert_eq!(dims, vec![(300, 200), (200, 300), (128, 128)]);
}
