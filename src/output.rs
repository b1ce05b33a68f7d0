//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Progress
//!
//! ```text
//! Decoded 4000x3000 jpeg
//! Resized 4000x3000 → 1024x768
//!     attempt 1: q=1.00 1024x768 → 0.41 MB
//!     attempt 2: q=0.90 1024x768 → 0.27 MB (fits)
//! ```
//!
//! ## Result
//!
//! ```text
//! Original size: 3.42 MB
//! Compressed size: 0.27 MB
//! Reduction: 92.11%
//!     Output: compressed-photo.jpg (jpeg 1024x768, q=0.90, 2 attempts)
//! ```
//!
//! Sizes are shown in megabytes (1 MB = 1024 × 1024 bytes) with two decimals.
//! Over-budget and grown results get a trailing `Note:` line; they are still
//! successes. Failures use a distinct `Failed (<kind>)` header.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout or stderr. Format functions are
//! pure: no I/O, no side effects.

use crate::compress::{CompressError, CompressEvent};
use crate::types::CompressionResult;
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// `bytes` as megabytes with two decimals.
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Decoded {
            width,
            height,
            format,
        } => vec![format!(
            "Decoded {width}x{height} {}",
            format!("{format:?}").to_lowercase()
        )],
        CompressEvent::Resized { from, to } if from == to => {
            vec![format!("Kept {}x{} (within bounds)", from.0, from.1)]
        }
        CompressEvent::Resized { from, to } => vec![format!(
            "Resized {}x{} \u{2192} {}x{}",
            from.0, from.1, to.0, to.1
        )],
        CompressEvent::Attempt {
            attempt,
            quality,
            width,
            height,
            size_bytes,
            fits,
        } => vec![format!(
            "{}attempt {attempt}: q={quality} {width}x{height} \u{2192} {}{}",
            indent(1),
            format_mb(*size_bytes),
            if *fits { " (fits)" } else { "" }
        )],
        CompressEvent::Downscaled {
            round,
            width,
            height,
        } => vec![format!("Downscale round {round}: {width}x{height}")],
        // The result block reports the final numbers
        CompressEvent::Finished { .. } => Vec::new(),
    }
}

pub fn print_event(event: &CompressEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Result
// ============================================================================

/// Format a finished job: sizes, reduction and where the output went.
pub fn format_result(
    result: &CompressionResult,
    output: Option<&Path>,
    max_size_bytes: u64,
) -> Vec<String> {
    let mut lines = vec![
        format!("Original size: {}", format_mb(result.original_size_bytes)),
        format!("Compressed size: {}", format_mb(result.compressed_size_bytes)),
    ];
    if let Some(pct) = result.percentage_reduction() {
        lines.push(format!("Reduction: {pct:.2}%"));
    }

    let attempts = match result.attempts {
        1 => "1 attempt".to_string(),
        n => format!("{n} attempts"),
    };
    let detail = format!(
        "{} {}x{}, q={}, {attempts}",
        result.format, result.width, result.height, result.quality
    );
    match output {
        Some(path) => lines.push(format!("{}Output: {} ({detail})", indent(1), file_name(path))),
        None => lines.push(format!("{}Output: {detail}", indent(1))),
    }
    if result.downscale_rounds > 0 {
        lines.push(format!(
            "{}Downscale rounds: {}",
            indent(1),
            result.downscale_rounds
        ));
    }

    if !result.fits_budget {
        lines.push(format!(
            "Note: could not reach the {} budget; kept the smallest result",
            format_mb(max_size_bytes)
        ));
    }
    if result.grew() {
        lines.push("Note: the compressed file is larger than the original".to_string());
    }
    lines
}

pub fn print_result(result: &CompressionResult, output: Option<&Path>, max_size_bytes: u64) {
    for line in format_result(result, output, max_size_bytes) {
        println!("{}", line);
    }
}

// ============================================================================
// Failure
// ============================================================================

/// Format a failed job. Always distinct from an over-budget success.
pub fn format_failure(error: &CompressError, input: &Path) -> Vec<String> {
    vec![
        format!("Failed ({}): {}", error.kind(), file_name(input)),
        format!("{}{}", indent(1), error),
    ]
}

pub fn print_failure(error: &CompressError, input: &Path) {
    for line in format_failure(error, input) {
        eprintln!("{}", line);
    }
}
