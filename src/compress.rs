//! Size-fitting controller.
//!
//! Turns one [`SourceImage`] into an encoded artifact that fits
//! `max_size_bytes` while keeping the longer edge within
//! `max_dimension_pixels`. The search is an explicit state machine:
//!
//! ```text
//! Idle → Decoding → Resizing → Encoding(q) ─┬─ fits ─────────────→ Done
//!                              ↑  │         ├─ q - step ≥ floor ─→ Encoding(q - step)
//!                              │  │         └─ floor exhausted ──→ Done (closest)
//!                              │  └─ downscale or lossless ─→ Downscaling(round)
//!                              └───────────────────────────────────┘
//! ```
//!
//! Formats without a quality dial (PNG, lossless WebP) always escalate to
//! downscaling, since geometry is the only thing that shrinks them.
//!
//! Any codec error moves to `Failed`, and a cancelled [`CancelToken`] moves to
//! `Cancelled` at the next checkpoint (before decode, before resize, before
//! each encode and before each downscale round).
//!
//! The controller is synchronous. Running it off the caller's thread is the
//! [`host`](crate::host) module's job.

use crate::config::{CompressionOptions, ConfigError};
use crate::imaging::{
    BackendError, Decoded, Downscale, ImageBackend, OutputFormat, PixelBuffer, Quality,
    RustBackend, downscale_by, quality_ladder, resize_to_fit,
};
use crate::types::{CompressionResult, SourceImage};
use image::ImageFormat;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Compression was cancelled")]
    Cancelled,
    #[error("Worker stopped without reporting a result")]
    WorkerLost,
}

impl CompressError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::InvalidOptions(_) => FailureKind::InvalidOptions,
            Self::Backend(BackendError::Decode(_)) => FailureKind::Decode,
            Self::Backend(BackendError::Resize(_)) => FailureKind::Resize,
            Self::Backend(BackendError::Encode(_)) => FailureKind::Encode,
            Self::Cancelled => FailureKind::Cancelled,
            Self::WorkerLost => FailureKind::WorkerLost,
        }
    }
}

/// Tag identifying which stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    InvalidInput,
    InvalidOptions,
    Decode,
    Resize,
    Encode,
    Cancelled,
    WorkerLost,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid input",
            Self::InvalidOptions => "invalid options",
            Self::Decode => "decode error",
            Self::Resize => "resize error",
            Self::Encode => "encode error",
            Self::Cancelled => "cancelled",
            Self::WorkerLost => "worker lost",
        };
        f.write_str(name)
    }
}

/// Shared cancellation flag between one job and its handle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications sent while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressEvent {
    Decoded {
        width: u32,
        height: u32,
        format: ImageFormat,
    },
    Resized {
        from: (u32, u32),
        to: (u32, u32),
    },
    Attempt {
        attempt: u32,
        quality: Quality,
        width: u32,
        height: u32,
        size_bytes: u64,
        fits: bool,
    },
    Downscaled {
        round: u32,
        width: u32,
        height: u32,
    },
    Finished {
        quality: Quality,
        size_bytes: u64,
        fits_budget: bool,
    },
}

/// Where a job currently is. `Done`, `Failed` and `Cancelled` are terminal.
#[derive(Debug)]
pub enum JobState {
    Idle,
    Decoding,
    Resizing,
    Encoding { quality: Quality },
    Downscaling { round: u32 },
    Done(CompressionResult),
    Failed(CompressError),
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_) | Self::Cancelled)
    }
}

/// Smallest output seen so far, kept for best-effort termination.
struct Attempt {
    bytes: Vec<u8>,
    quality: Quality,
    width: u32,
    height: u32,
}

/// One compression job driven through [`JobState`] transitions.
pub struct Job<'a, B: ImageBackend> {
    backend: &'a B,
    source: &'a SourceImage,
    options: &'a CompressionOptions,
    cancel: &'a CancelToken,
    events: Option<Sender<CompressEvent>>,
    state: JobState,
    buffer: Option<PixelBuffer>,
    format: OutputFormat,
    ladder: Vec<Quality>,
    rung: usize,
    round: u32,
    attempts: u32,
    closest: Option<Attempt>,
}

impl<'a, B: ImageBackend> Job<'a, B> {
    pub fn new(
        backend: &'a B,
        source: &'a SourceImage,
        options: &'a CompressionOptions,
        cancel: &'a CancelToken,
        events: Option<Sender<CompressEvent>>,
    ) -> Self {
        Self {
            backend,
            source,
            options,
            cancel,
            events,
            state: JobState::Idle,
            buffer: None,
            format: OutputFormat::Jpeg,
            ladder: Vec::new(),
            rung: 0,
            round: 0,
            attempts: 0,
            closest: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Perform one transition. Does nothing once the job is terminal.
    pub fn step(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        let current = std::mem::replace(&mut self.state, JobState::Idle);
        self.state = match self.transition(current) {
            Ok(next) => next,
            Err(err) => {
                debug!("job failed: {err}");
                JobState::Failed(err)
            }
        };
    }

    /// Step until a terminal state and return the outcome.
    pub fn run(mut self) -> Result<CompressionResult, CompressError> {
        while !self.state.is_terminal() {
            self.step();
        }
        match self.state {
            JobState::Done(result) => Ok(result),
            JobState::Failed(err) => Err(err),
            _ => Err(CompressError::Cancelled),
        }
    }

    fn transition(&mut self, state: JobState) -> Result<JobState, CompressError> {
        if self.cancel.is_cancelled() {
            debug!("job cancelled while {}", describe(&state));
            return Ok(JobState::Cancelled);
        }

        match state {
            JobState::Idle => {
                if self.source.byte_len() == 0 {
                    return Err(CompressError::InvalidInput(
                        "input contains no bytes".to_string(),
                    ));
                }
                self.options.validate()?;
                Ok(JobState::Decoding)
            }
            JobState::Decoding => {
                let decoded = self
                    .backend
                    .decode(self.source.bytes(), self.source.mime_type())?;
                let (width, height) = decoded.buffer.dimensions();
                debug!(
                    "decoded {:?} {width}x{height} ({} bytes)",
                    decoded.format,
                    self.source.byte_len()
                );
                self.format = self
                    .options
                    .output_format
                    .unwrap_or_else(|| default_output_format(&decoded));
                self.emit(CompressEvent::Decoded {
                    width,
                    height,
                    format: decoded.format,
                });
                self.buffer = Some(decoded.buffer);
                Ok(JobState::Resizing)
            }
            JobState::Resizing => {
                let buffer = self.take_buffer()?;
                let from = buffer.dimensions();
                let resized = resize_to_fit(
                    self.backend,
                    buffer,
                    self.options.max_dimension_pixels,
                    self.options.resample_filter,
                )?;
                let to = resized.dimensions();
                if from != to {
                    debug!("resized {}x{} → {}x{}", from.0, from.1, to.0, to.1);
                }
                self.emit(CompressEvent::Resized { from, to });
                self.buffer = Some(resized);
                Ok(self.start_ladder())
            }
            JobState::Encoding { quality } => self.encode_attempt(quality),
            JobState::Downscaling { round } => {
                let buffer = self.take_buffer()?;
                match downscale_by(
                    self.backend,
                    buffer,
                    self.options.downscale.factor,
                    self.options.resample_filter,
                )? {
                    Downscale::Shrunk(smaller) => {
                        let (width, height) = smaller.dimensions();
                        debug!("downscale round {round}: {width}x{height}");
                        self.emit(CompressEvent::Downscaled {
                            round,
                            width,
                            height,
                        });
                        self.round = round;
                        self.buffer = Some(smaller);
                        Ok(self.start_ladder())
                    }
                    Downscale::Exhausted(buffer) => {
                        debug!("downscale round {round}: geometry cannot shrink further");
                        self.buffer = Some(buffer);
                        self.finish_closest()
                    }
                }
            }
            JobState::Done(_) | JobState::Failed(_) | JobState::Cancelled => Ok(state),
        }
    }

    fn encode_attempt(&mut self, quality: Quality) -> Result<JobState, CompressError> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| BackendError::Encode("no raster to encode".to_string()))?;
        let (width, height) = buffer.dimensions();
        let bytes = self.backend.encode(buffer, self.format, quality)?;
        self.attempts += 1;

        let size = bytes.len() as u64;
        let fits = size <= self.options.max_size_bytes;
        debug!(
            "attempt {}: {} q={quality} {width}x{height} → {size} bytes{}",
            self.attempts,
            self.format,
            if fits { " (fits)" } else { "" }
        );
        self.emit(CompressEvent::Attempt {
            attempt: self.attempts,
            quality,
            width,
            height,
            size_bytes: size,
            fits,
        });

        let attempt = Attempt {
            bytes,
            quality,
            width,
            height,
        };
        if fits {
            return Ok(self.finish(attempt, true));
        }
        // Ties keep the earlier, higher-quality attempt
        if self
            .closest
            .as_ref()
            .is_none_or(|best| attempt.bytes.len() < best.bytes.len())
        {
            self.closest = Some(attempt);
        }

        if self.rung + 1 < self.ladder.len() {
            self.rung += 1;
            return Ok(JobState::Encoding {
                quality: self.ladder[self.rung],
            });
        }
        let downscale = &self.options.downscale;
        // Lossless output has no quality dial, so geometry is its only lever
        let escalate = downscale.enabled || !self.format.has_quality_dial();
        if escalate && self.round < downscale.max_rounds {
            return Ok(JobState::Downscaling {
                round: self.round + 1,
            });
        }
        self.finish_closest()
    }

    /// Reset the quality search for the current geometry.
    fn start_ladder(&mut self) -> JobState {
        self.ladder = if self.format.has_quality_dial() {
            quality_ladder(
                self.options.initial_quality,
                self.options.quality_floor,
                self.options.quality_step,
            )
        } else {
            vec![Quality::MAX]
        };
        self.rung = 0;
        JobState::Encoding {
            quality: self.ladder[0],
        }
    }

    fn finish_closest(&mut self) -> Result<JobState, CompressError> {
        let closest = self
            .closest
            .take()
            .ok_or_else(|| BackendError::Encode("no encode attempt was made".to_string()))?;
        Ok(self.finish(closest, false))
    }

    fn finish(&mut self, attempt: Attempt, fits_budget: bool) -> JobState {
        let result = CompressionResult {
            compressed_size_bytes: attempt.bytes.len() as u64,
            bytes: attempt.bytes,
            format: self.format,
            width: attempt.width,
            height: attempt.height,
            quality: attempt.quality,
            attempts: self.attempts,
            downscale_rounds: self.round,
            original_size_bytes: self.source.byte_len(),
            fits_budget,
        };
        info!(
            "compressed {} → {} bytes as {} {}x{} q={} after {} attempt(s){}",
            result.original_size_bytes,
            result.compressed_size_bytes,
            result.format,
            result.width,
            result.height,
            result.quality,
            result.attempts,
            if fits_budget { "" } else { ", over budget" }
        );
        self.emit(CompressEvent::Finished {
            quality: result.quality,
            size_bytes: result.compressed_size_bytes,
            fits_budget,
        });
        JobState::Done(result)
    }

    fn take_buffer(&mut self) -> Result<PixelBuffer, CompressError> {
        self.buffer
            .take()
            .ok_or_else(|| BackendError::Resize("no decoded raster".to_string()).into())
    }

    fn emit(&self, event: CompressEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(event);
        }
    }
}

/// Output format when none is requested: the source's own family, or PNG when
/// that family cannot store the decoded alpha channel.
fn default_output_format(decoded: &Decoded) -> OutputFormat {
    let family = OutputFormat::for_source(decoded.format);
    if decoded.buffer.layout.has_alpha() && !family.supports_alpha() {
        OutputFormat::Png
    } else {
        family
    }
}

fn describe(state: &JobState) -> String {
    match state {
        JobState::Idle => "idle".to_string(),
        JobState::Decoding => "decoding".to_string(),
        JobState::Resizing => "resizing".to_string(),
        JobState::Encoding { quality } => format!("encoding at q={quality}"),
        JobState::Downscaling { round } => format!("downscaling (round {round})"),
        JobState::Done(_) => "done".to_string(),
        JobState::Failed(_) => "failed".to_string(),
        JobState::Cancelled => "cancelled".to_string(),
    }
}

/// Compress `source` with the pure-Rust codecs on the calling thread.
pub fn compress(
    source: &SourceImage,
    options: &CompressionOptions,
) -> Result<CompressionResult, CompressError> {
    compress_with_backend(
        &RustBackend::new(),
        source,
        options,
        &CancelToken::new(),
        None,
    )
}

/// Compress `source` with an explicit backend, cancellation token and
/// optional progress channel.
pub fn compress_with_backend(
    backend: &impl ImageBackend,
    source: &SourceImage,
    options: &CompressionOptions,
    cancel: &CancelToken,
    events: Option<Sender<CompressEvent>>,
) -> Result<CompressionResult, CompressError> {
    Job::new(backend, source, options, cancel, events).run()
}
