//! Compressor configuration module.
//!
//! Handles loading, validating, and merging `imgfit.toml`. Stock defaults are
//! overridden by the user's config file, which is in turn overridden by CLI
//! flags (applied by the binary after loading).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! max_size_bytes = 1048576        # Byte budget for the output
//! max_dimension_pixels = 1024     # Bound on the longer edge
//! quality_floor = 0.5             # Lowest quality the search may use
//! quality_step = 0.1              # Quality decrement per attempt
//! initial_quality = 1.0           # First quality tried
//! prefer_speed = true             # Run jobs on the background worker pool
//! resample_filter = "catmull-rom" # catmull-rom | lanczos3 | triangle
//! # output_format = "jpeg"        # jpeg | png | webp (default: source family)
//!
//! [compression.downscale]
//! enabled = false                 # Shrink further once the quality floor is hit
//! factor = 0.9                    # Edge multiplier per extra round
//! max_rounds = 4                  # Extra rounds before giving up
//!
//! [decoder]
//! max_width = 16384               # Reject headers wider than this
//! max_height = 16384              # Reject headers taller than this
//! max_alloc_bytes = 536870912     # Decoder allocation ceiling
//!
//! [processing]
//! max_workers = 4                 # Worker threads (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DecodeLimits, OutputFormat, ResampleFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "imgfit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `imgfit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Size-fitting search settings.
    pub compression: CompressionOptions,
    /// Decoder safety ceiling.
    pub decoder: DecodeLimits,
    /// Worker pool settings.
    pub processing: ProcessingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compression.validate()?;
        if self.decoder.max_width == 0 || self.decoder.max_height == 0 {
            return Err(ConfigError::Validation(
                "decoder.max_width and decoder.max_height must be greater than 0".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1 (omit it for auto)".into(),
            ));
        }
        Ok(())
    }
}

/// Options for one compression request.
///
/// Passed explicitly to every job; there is no ambient configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionOptions {
    /// Upper bound on the output size in bytes.
    pub max_size_bytes: u64,
    /// Upper bound on `max(width, height)` after resizing.
    pub max_dimension_pixels: u32,
    /// Lowest quality the search may try, in `(0, 1]`.
    pub quality_floor: f32,
    /// Quality decrement between attempts.
    pub quality_step: f32,
    /// First quality tried. The result favours the highest quality that fits.
    pub initial_quality: f32,
    /// Run the job on the worker pool instead of the caller's thread.
    pub prefer_speed: bool,
    /// Output container. `None` keeps the source format family.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Resampling filter for the bounding resize and any downscale rounds.
    pub resample_filter: ResampleFilter,
    /// What to do once the quality floor is exhausted.
    pub downscale: DownscaleConfig,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: 1_048_576,
            max_dimension_pixels: 1024,
            quality_floor: 0.5,
            quality_step: 0.1,
            initial_quality: 1.0,
            prefer_speed: true,
            output_format: None,
            resample_filter: ResampleFilter::default(),
            downscale: DownscaleConfig::default(),
        }
    }
}

impl CompressionOptions {
    /// Validate option values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size_bytes == 0 {
            return Err(ConfigError::Validation(
                "compression.max_size_bytes must be greater than 0".into(),
            ));
        }
        if self.max_dimension_pixels == 0 {
            return Err(ConfigError::Validation(
                "compression.max_dimension_pixels must be greater than 0".into(),
            ));
        }
        if !(self.quality_floor > 0.0 && self.quality_floor <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.quality_floor must be in (0, 1]".into(),
            ));
        }
        if !(self.quality_step > 0.0 && self.quality_step <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.quality_step must be in (0, 1]".into(),
            ));
        }
        if !(self.initial_quality >= self.quality_floor && self.initial_quality <= 1.0) {
            return Err(ConfigError::Validation(
                "compression.initial_quality must be between quality_floor and 1".into(),
            ));
        }
        if !(self.downscale.factor > 0.0 && self.downscale.factor < 1.0) {
            return Err(ConfigError::Validation(
                "compression.downscale.factor must be in (0, 1)".into(),
            ));
        }
        Ok(())
    }
}

/// Policy applied once the quality ladder is exhausted and the output is
/// still over budget.
///
/// Disabled: accept the closest achievable size. Enabled: shrink the raster
/// by `factor` and run the ladder again, up to `max_rounds` times. Formats
/// without a quality dial always behave as if enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownscaleConfig {
    pub enabled: bool,
    pub factor: f64,
    pub max_rounds: u32,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: 0.9,
            max_rounds: 4,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults. User values are merged on top of
/// the defaults, unknown keys are rejected, and the result is validated.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imgfit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgfit Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override the values in this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Size-fitting search
# ---------------------------------------------------------------------------
[compression]
# Byte budget for the compressed output (1 MB).
max_size_bytes = 1048576

# Bound on the longer edge, in pixels. Images are never upscaled.
max_dimension_pixels = 1024

# The search starts at initial_quality and lowers quality by quality_step
# until the output fits the budget or quality_floor is reached.
# Qualities are in (0, 1]; 1 is best fidelity.
initial_quality = 1.0
quality_step = 0.1
quality_floor = 0.5

# Run the job on the background worker pool. When false the job runs on
# the calling thread.
prefer_speed = true

# Resampling filter: "catmull-rom" (bicubic), "lanczos3" or "triangle".
resample_filter = "catmull-rom"

# Output container: "jpeg", "png" or "webp" (lossless).
# Omit to keep the source format family (TIFF sources become JPEG).
# output_format = "jpeg"

# ---------------------------------------------------------------------------
# Quality floor exhausted
# ---------------------------------------------------------------------------
# When disabled, the closest achievable size is returned even if it is over
# budget. When enabled, the image is shrunk by `factor` and the quality
# search runs again, up to `max_rounds` extra times. PNG and WebP output have
# no quality setting, so they always shrink this way.
[compression.downscale]
enabled = false
factor = 0.9
max_rounds = 4

# ---------------------------------------------------------------------------
# Decoder safety ceiling
# ---------------------------------------------------------------------------
[decoder]
max_width = 16384
max_height = 16384
max_alloc_bytes = 536870912

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 4
"##
}
