//! Shared types passed between the controller, the host and the CLI.
//!
//! [`SourceImage`] is the immutable input of one job. [`CompressionResult`] is
//! its artifact, and [`CompressionReport`] is the serializable summary the CLI
//! prints with `--json`.

use crate::imaging::{OutputFormat, Quality, percentage_reduction};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Encoded input bytes plus what the caller knows about them.
///
/// Immutable once built; a job only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Vec<u8>,
    mime_type: Option<String>,
    name: Option<String>,
}

impl SourceImage {
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.map(str::to_string),
            name: None,
        }
    }

    /// Read a file, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self {
            bytes,
            mime_type: mime_for_path(path).map(str::to_string),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Declared MIME type for a file extension (case-insensitive).
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" | "jpe" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// The artifact of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    /// Encoded output.
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Quality used for the returned bytes.
    pub quality: Quality,
    /// Total encode calls across every geometry.
    pub attempts: u32,
    /// Extra geometry reductions after the quality ladder ran out.
    pub downscale_rounds: u32,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
    /// `false` when the budget could not be met and the closest attempt was
    /// returned instead.
    pub fits_budget: bool,
}

impl CompressionResult {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Size reduction in percent. Negative when the output grew.
    pub fn percentage_reduction(&self) -> Option<f64> {
        percentage_reduction(self.original_size_bytes, self.compressed_size_bytes)
    }

    /// Whether the output is larger than the input.
    pub fn grew(&self) -> bool {
        self.compressed_size_bytes > self.original_size_bytes
    }

    pub fn report(&self) -> CompressionReport {
        CompressionReport {
            output: None,
            format: self.format,
            mime_type: self.mime_type().to_string(),
            width: self.width,
            height: self.height,
            quality: self.quality.value(),
            attempts: self.attempts,
            downscale_rounds: self.downscale_rounds,
            original_size_bytes: self.original_size_bytes,
            compressed_size_bytes: self.compressed_size_bytes,
            percentage_reduction: self.percentage_reduction(),
            fits_budget: self.fits_budget,
            grew: self.grew(),
        }
    }
}

/// Byte-free summary of a [`CompressionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    /// Where the CLI wrote the output, when it wrote one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub format: OutputFormat,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub attempts: u32,
    pub downscale_rounds: u32,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
    pub percentage_reduction: Option<f64>,
    pub fits_budget: bool,
    pub grew: bool,
}
