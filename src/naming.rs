//! Output file naming.
//!
//! Compressed files are named `compressed-<original name>` and land next to
//! the input:
//! - `photo.jpg` → `compressed-photo.jpg`
//! - `photo.JPEG` compressed to JPEG → `compressed-photo.JPEG` (extension kept)
//! - `scan.tiff` compressed to JPEG → `compressed-scan.jpg` (extension replaced)
//! - `README` → `compressed-README.jpg` (extension added)

use crate::imaging::OutputFormat;
use crate::types::mime_for_path;
use std::path::{Path, PathBuf};

/// Prefix prepended to every default output name.
pub const OUTPUT_PREFIX: &str = "compressed-";

/// File name for the compressed copy of `input_name` written as `format`.
///
/// The original extension is kept when it already names `format`; otherwise
/// it is replaced with the format's canonical extension.
pub fn compressed_file_name(input_name: &str, format: OutputFormat) -> String {
    let path = Path::new(input_name);
    let keeps_extension = mime_for_path(path).and_then(OutputFormat::from_mime) == Some(format);
    if keeps_extension {
        return format!("{OUTPUT_PREFIX}{input_name}");
    }

    let stem = match path.extension() {
        Some(_) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        None => input_name.to_string(),
    };
    format!("{OUTPUT_PREFIX}{stem}.{}", format.extension())
}

/// Default output path: the compressed name in the input's directory.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(compressed_file_name(&name, format))
}
