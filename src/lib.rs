//! # imgfit
//!
//! Compress an image so it fits a byte budget and a maximum pixel dimension.
//! The longer edge is bounded first, then encoder quality is lowered step by
//! step until the output fits or the quality floor is reached.
//!
//! # Architecture: One Job, Four Stages
//!
//! ```text
//! SourceImage ─ decode ─→ PixelBuffer ─ resize ─→ PixelBuffer ─ encode(q) ─→ bytes
//!                                                       ↑            │
//!                                                       └─ q - step ─┘ (over budget)
//! ```
//!
//! - **Decode** sniffs the container, checks the header against a safety
//!   ceiling, and normalises the raster to 8-bit samples.
//! - **Resize** bounds the longer edge and never upscales.
//! - **Encode** runs once per quality rung, reusing the resized raster.
//! - **Decide** stops at the first rung that fits. When none does, the
//!   smallest attempt is returned with `fits_budget = false`. Running out of
//!   quality is not an error. Lossless formats have no quality dial, so they
//!   shrink the raster instead.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | Size-fitting controller: [`compress::JobState`] machine, cancellation, events |
//! | [`host`] | Background jobs on a dedicated `rayon` pool, [`host::JobHandle`] wait/poll/cancel |
//! | [`imaging`] | Codec backend trait, pure-Rust `image` backend, geometry and ladder math |
//! | [`config`] | `imgfit.toml` loading, validation and merging over stock defaults |
//! | [`types`] | [`SourceImage`], [`CompressionResult`] and the serializable report |
//! | [`naming`] | `compressed-<name>` output file naming |
//! | [`output`] | CLI output formatting (pure `format_*` functions + `print_*` wrappers) |
//!
//! # Design Decisions
//!
//! ## Synchronous Core, Optional Host
//!
//! [`compress()`] is a plain blocking function. Off-thread execution is layered
//! on top by [`host::Host`], which owns its own thread pool so embedding
//! applications keep control of their global parallelism. With
//! `prefer_speed = false` the host runs the job on the caller's thread.
//!
//! ## Best-Effort Termination
//!
//! A budget that cannot be met at the quality floor still produces an artifact:
//! the smallest output seen. Callers can opt into extra downscale rounds
//! (`[compression.downscale]`) that shrink the raster and restart the quality
//! search.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding, resampling and encoding use the `image` crate only, so the binary
//! has no system library dependencies.

pub mod compress;
pub mod config;
pub mod host;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod types;

pub use compress::{
    CancelToken, CompressError, CompressEvent, FailureKind, compress, compress_with_backend,
};
pub use config::CompressionOptions;
pub use host::{Host, JobHandle};
pub use types::{CompressionReport, CompressionResult, SourceImage};
