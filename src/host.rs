//! Execution host: runs compression jobs off the caller's thread.
//!
//! A [`Host`] owns a dedicated `rayon` pool (never the global one) and a shared
//! backend. Each submission returns a [`JobHandle`] the caller can wait on,
//! poll, or cancel. Dropping an unresolved handle cancels its job at the next
//! checkpoint; an encode already in flight finishes first.
//!
//! With `prefer_speed = false` the job runs synchronously inside `submit` and
//! the handle comes back already resolved.

use crate::compress::{CancelToken, CompressError, CompressEvent, compress_with_backend};
use crate::config::{CompressionOptions, Config, ProcessingConfig, effective_workers};
use crate::imaging::{ImageBackend, RustBackend};
use crate::types::{CompressionResult, SourceImage};
use log::{debug, error};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Outcome of one job.
pub type JobOutcome = Result<CompressionResult, CompressError>;

/// Worker pool plus the backend every job on it shares.
pub struct Host<B = RustBackend> {
    backend: Arc<B>,
    pool: rayon::ThreadPool,
    workers: usize,
}

impl Host<RustBackend> {
    pub fn new(processing: &ProcessingConfig) -> Result<Self, HostError> {
        Self::with_backend(RustBackend::new(), processing)
    }

    /// Host using the decoder limits and worker count from `config`.
    pub fn from_config(config: &Config) -> Result<Self, HostError> {
        Self::with_backend(RustBackend::with_limits(config.decoder), &config.processing)
    }
}

impl<B: ImageBackend + Send + 'static> Host<B> {
    pub fn with_backend(backend: B, processing: &ProcessingConfig) -> Result<Self, HostError> {
        let workers = effective_workers(processing);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("imgfit-worker-{i}"))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("compression worker panicked: {message}");
            })
            .build()?;
        debug!("worker pool ready with {workers} thread(s)");
        Ok(Self {
            backend: Arc::new(backend),
            pool,
            workers,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn submit(&self, source: SourceImage, options: CompressionOptions) -> JobHandle {
        self.dispatch(source, options, None)
    }

    /// Like [`submit`](Self::submit), streaming progress to `events`.
    ///
    /// The job drops its sender when it ends, so the receiver's iterator
    /// terminates on its own.
    pub fn submit_with_events(
        &self,
        source: SourceImage,
        options: CompressionOptions,
        events: Sender<CompressEvent>,
    ) -> JobHandle {
        self.dispatch(source, options, Some(events))
    }

    fn dispatch(
        &self,
        source: SourceImage,
        options: CompressionOptions,
        events: Option<Sender<CompressEvent>>,
    ) -> JobHandle {
        let cancel = CancelToken::new();

        if !options.prefer_speed {
            let outcome =
                compress_with_backend(&*self.backend, &source, &options, &cancel, events);
            return JobHandle::resolved(outcome);
        }

        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(&self.backend);
        let token = cancel.clone();
        self.pool.spawn(move || {
            let outcome = compress_with_backend(&*backend, &source, &options, &token, events);
            // The handle may already be gone
            let _ = tx.send(outcome);
        });
        JobHandle {
            receiver: Some(rx),
            outcome: None,
            cancel,
        }
    }
}

/// Caller's side of one submitted job.
pub struct JobHandle {
    receiver: Option<Receiver<JobOutcome>>,
    outcome: Option<JobOutcome>,
    cancel: CancelToken,
}

impl JobHandle {
    fn resolved(outcome: JobOutcome) -> Self {
        Self {
            receiver: None,
            outcome: Some(outcome),
            cancel: CancelToken::new(),
        }
    }

    /// Block until the job ends.
    pub fn wait(mut self) -> JobOutcome {
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => match &self.receiver {
                Some(rx) => rx.recv().unwrap_or(Err(CompressError::WorkerLost)),
                None => Err(CompressError::WorkerLost),
            },
        };
        self.receiver = None;
        outcome
    }

    /// Block for at most `timeout`. `None` means the job is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<&JobOutcome> {
        if self.outcome.is_none() {
            let rx = self.receiver.as_ref()?;
            self.outcome = match rx.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => Some(Err(CompressError::WorkerLost)),
            };
        }
        self.outcome.as_ref()
    }

    /// Non-blocking poll.
    pub fn try_result(&mut self) -> Option<&JobOutcome> {
        if self.outcome.is_none() {
            let rx = self.receiver.as_ref()?;
            self.outcome = match rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => Some(Err(CompressError::WorkerLost)),
            };
        }
        self.outcome.as_ref()
    }

    /// Ask the job to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if self.outcome.is_none() && self.receiver.is_some() {
            self.cancel.cancel();
        }
    }
}
