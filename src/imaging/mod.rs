//! Image codecs: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, WebP, TIFF) with header limits |
//! | **Resize** | `resize_exact` with Catmull-Rom (default), Lanczos3 or Triangle |
//! | **Encode** | JPEG (quality dial), PNG and WebP (lossless) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry, quality ladders and metrics (unit testable)
//! - **Parameters**: Quality, output format and filter types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{
    BackendError, ChannelLayout, DecodeLimits, Decoded, ImageBackend, PixelBuffer,
};
pub use calculations::{fit_within, percentage_reduction, quality_ladder, scale_dimensions};
pub use operations::{Downscale, downscale_by, resize_to_fit};
pub use params::{MIN_QUALITY, OutputFormat, Quality, ResampleFilter};
pub use rust_backend::RustBackend;
