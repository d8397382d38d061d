//! Per-transfer state.
//!
//! A [`StreamingContext`] is created by `begin_transfer` and shared between
//! the caller's [`TransferHandle`] and the producer registered with the
//! transport. It owns the provider until the transfer finishes, which
//! happens exactly once:
//!
//! ```text
//! read returns 0          → Completed (or Short, when offset < total)
//! timeout expired on pull → TimedOut
//! TransferHandle::cancel  → Cancelled
//! producer dropped        → Aborted
//! ```
//!
//! Finishing drops the provider, closing any storage handle it holds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chunkflow_provider::ContentProvider;

/// Called after every non-empty chunk with `(transferred, total)`.
pub type ProgressCallback = Box<dyn FnMut(u64, u64) + Send>;

/// How a transfer ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The provider returned 0 at or past the declared size.
    Completed,
    /// The provider returned 0 before the declared size.
    Short,
    /// The caller cancelled through its handle.
    Cancelled,
    /// The transport dropped the producer.
    Aborted,
    TimedOut,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Completed => "completed",
            TransferOutcome::Short => "short",
            TransferOutcome::Cancelled => "cancelled",
            TransferOutcome::Aborted => "aborted",
            TransferOutcome::TimedOut => "timed_out",
        }
    }
}

/// State of one active transfer.
pub struct StreamingContext {
    route: String,
    provider: Option<Box<dyn ContentProvider>>,
    buffer_size: usize,
    total_size: u64,
    mime_type: String,
    bytes_transferred: u64,
    chunks: u64,
    started_at: Instant,
    /// `Duration::ZERO` disables the check.
    timeout: Duration,
    outcome: Option<TransferOutcome>,
}

impl StreamingContext {
    pub(crate) fn new(
        route: &str,
        provider: Box<dyn ContentProvider>,
        buffer_size: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            route: route.to_string(),
            total_size: provider.total_size(),
            mime_type: provider.mime_type().to_string(),
            provider: Some(provider),
            buffer_size,
            bytes_transferred: 0,
            chunks: 0,
            started_at: Instant::now(),
            timeout,
            outcome: None,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn is_active(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn outcome(&self) -> Option<TransferOutcome> {
        self.outcome
    }

    /// Produce the chunk at `offset` into `buf`.
    fn pull(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if self.outcome.is_some() || buf.is_empty() {
            return 0;
        }

        let elapsed = self.started_at.elapsed();
        if !self.timeout.is_zero() && elapsed > self.timeout {
            tracing::warn!(
                route = %self.route,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.timeout.as_millis() as u64,
                transferred = self.bytes_transferred,
                "transfer timed out"
            );
            self.finish(TransferOutcome::TimedOut);
            return 0;
        }

        let len = self.buffer_size.min(buf.len());
        let n = match self.provider.as_mut() {
            Some(provider) => provider.read_chunk(&mut buf[..len], offset),
            None => 0,
        };

        if n == 0 {
            // End of content and a failed read look the same from here.
            let outcome = if offset < self.total_size {
                tracing::warn!(
                    route = %self.route,
                    offset,
                    total_size = self.total_size,
                    "provider returned no data before declared size"
                );
                TransferOutcome::Short
            } else {
                TransferOutcome::Completed
            };
            self.finish(outcome);
            return 0;
        }

        let n = n.min(len);
        self.bytes_transferred += n as u64;
        self.chunks += 1;
        tracing::debug!(route = %self.route, offset, len = n, "produced chunk");
        n
    }

    /// End the transfer and release the provider. Later calls are no-ops.
    fn finish(&mut self, outcome: TransferOutcome) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(outcome);
        drop(self.provider.take());

        tracing::info!(
            route = %self.route,
            outcome = outcome.as_str(),
            bytes = self.bytes_transferred,
            total_size = self.total_size,
            chunks = self.chunks,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "transfer finished"
        );
    }
}

fn lock(context: &Mutex<StreamingContext>) -> MutexGuard<'_, StreamingContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The transport-side owner of a transfer.
///
/// Lives inside the registered producer closure. Holds the progress
/// callback, which runs after the context lock is released.
pub(crate) struct ProducerState {
    context: Arc<Mutex<StreamingContext>>,
    progress: Option<ProgressCallback>,
}

impl ProducerState {
    pub(crate) fn new(context: Arc<Mutex<StreamingContext>>, progress: Option<ProgressCallback>) -> Self {
        Self { context, progress }
    }

    pub(crate) fn pull(&mut self, buf: &mut [u8], offset: u64) -> usize {
        let (n, transferred, total) = {
            let mut context = lock(&self.context);
            let n = context.pull(buf, offset);
            (n, context.bytes_transferred, context.total_size)
        };

        if n > 0 {
            if let Some(progress) = self.progress.as_mut() {
                progress(transferred, total);
            }
        }
        n
    }
}

impl Drop for ProducerState {
    fn drop(&mut self) {
        lock(&self.context).finish(TransferOutcome::Aborted);
    }
}

/// Caller-side view of a transfer.
#[derive(Clone)]
pub struct TransferHandle {
    context: Arc<Mutex<StreamingContext>>,
}

impl TransferHandle {
    pub(crate) fn new(context: Arc<Mutex<StreamingContext>>) -> Self {
        Self { context }
    }

    pub fn route(&self) -> String {
        lock(&self.context).route.clone()
    }

    pub fn bytes_transferred(&self) -> u64 {
        lock(&self.context).bytes_transferred
    }

    pub fn total_size(&self) -> u64 {
        lock(&self.context).total_size
    }

    pub fn mime_type(&self) -> String {
        lock(&self.context).mime_type.clone()
    }

    pub fn buffer_size(&self) -> usize {
        lock(&self.context).buffer_size
    }

    pub fn chunks(&self) -> u64 {
        lock(&self.context).chunks
    }

    pub fn is_active(&self) -> bool {
        lock(&self.context).is_active()
    }

    pub fn outcome(&self) -> Option<TransferOutcome> {
        lock(&self.context).outcome
    }

    /// Fraction of the declared size transferred so far, in `0.0..=1.0`.
    ///
    /// An empty transfer reports `0.0` while active and `1.0` once finished.
    pub fn progress(&self) -> f64 {
        let context = lock(&self.context);
        if context.total_size == 0 {
            return if context.is_active() { 0.0 } else { 1.0 };
        }
        (context.bytes_transferred as f64 / context.total_size as f64).min(1.0)
    }

    /// End the transfer and release the provider.
    ///
    /// The transport's producer stays registered but returns 0 from now on.
    pub fn cancel(&self) {
        lock(&self.context).finish(TransferOutcome::Cancelled);
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let context = lock(&self.context);
        f.debug_struct("TransferHandle")
            .field("route", &context.route)
            .field("bytes_transferred", &context.bytes_transferred)
            .field("total_size", &context.total_size)
            .field("outcome", &context.outcome)
            .finish()
    }
}
