//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they work out
//! the target geometry, skip the backend entirely when nothing would change,
//! and otherwise delegate the pixel work.

use super::backend::{BackendError, ImageBackend, PixelBuffer};
use super::calculations::{fit_within, scale_dimensions};
use super::params::ResampleFilter;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Bound the longer edge of `buffer` to `max_dimension`.
///
/// Returns the buffer untouched when it already fits; never upscales. Fails
/// with [`BackendError::Resize`] on zero or inconsistent geometry.
pub fn resize_to_fit(
    backend: &impl ImageBackend,
    buffer: PixelBuffer,
    max_dimension: u32,
    filter: ResampleFilter,
) -> Result<PixelBuffer> {
    buffer.check_geometry()?;
    let source = buffer.dimensions();
    let (width, height) = fit_within(source, max_dimension);
    if (width, height) == source {
        return Ok(buffer);
    }
    backend.resize(buffer, width, height, filter)
}

/// Outcome of [`downscale_by`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downscale {
    /// The raster at its new, smaller geometry.
    Shrunk(PixelBuffer),
    /// Rounding left the geometry unchanged (the buffer is already 1 pixel on
    /// the edges that would shrink). The input buffer is handed back untouched.
    Exhausted(PixelBuffer),
}

/// Shrink both edges by `factor`.
pub fn downscale_by(
    backend: &impl ImageBackend,
    buffer: PixelBuffer,
    factor: f64,
    filter: ResampleFilter,
) -> Result<Downscale> {
    buffer.check_geometry()?;
    let source = buffer.dimensions();
    let (width, height) = scale_dimensions(source, factor);
    if (width, height) == source {
        return Ok(Downscale::Exhausted(buffer));
    }
    backend
        .resize(buffer, width, height, filter)
        .map(Downscale::Shrunk)
}
