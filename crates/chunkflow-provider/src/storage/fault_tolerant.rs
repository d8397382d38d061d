//! Storage-backed provider for media that can transiently disappear.
//!
//! Removable cards drop out mid-transfer: a seek or read fails, the handle is
//! dead, and the card may come back a moment later. This provider reopens the
//! file under a bounded retry budget.
//!
//! # Handle state machine
//!
//! ```text
//!            read/seek error
//!   Valid ─────────────────────▶ Invalid
//!     ▲                             │ next read, budget left
//!     │ reopen ok                   ▼
//!     └───────────────────────── reopen ──── budget spent ──▶ Exhausted
//! ```
//!
//! The budget counts reopen attempts since the last successful read. A read
//! that returns data resets the count to zero. `Exhausted` is terminal for
//! the provider instance.

use std::sync::Arc;

use chunkflow_core::config::DEFAULT_RETRY_BUDGET;
use chunkflow_core::mime;

use super::{OpenMode, StorageBackend, StorageHandle};
use crate::{ContentProvider, bounded_len};

#[derive(Debug)]
enum HandleState {
    Valid(Box<dyn StorageHandle>),
    Invalid,
    Exhausted,
}

/// Observable summary of the handle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryState {
    /// The handle is open.
    Valid,
    /// The handle was dropped; the next read will try to reopen it.
    Invalid,
    /// The retry budget is spent; every read returns 0.
    Exhausted,
}

/// Storage-backed provider with a bounded reopen/reseek budget.
#[derive(Debug)]
pub struct FaultTolerantStorageProvider {
    backend: Arc<dyn StorageBackend>,
    path: String,
    mime_type: &'static str,
    total_size: u64,
    state: HandleState,
    /// Reopen attempts since the last successful read.
    reopen_attempts: u32,
    max_reopen_attempts: u32,
    ready: bool,
}

impl FaultTolerantStorageProvider {
    /// Open `path` on `backend`, allowing `max_reopen_attempts` reopens
    /// between successful reads.
    pub fn open(backend: Arc<dyn StorageBackend>, path: &str, max_reopen_attempts: u32) -> Self {
        let mut provider = Self {
            backend,
            path: path.to_string(),
            mime_type: "",
            total_size: 0,
            state: HandleState::Invalid,
            reopen_attempts: 0,
            max_reopen_attempts,
            ready: false,
        };

        if !provider.backend.exists(path) {
            tracing::debug!(path = %path, backend = provider.backend.name(), "file not found");
            return provider;
        }

        match provider.backend.open(path, OpenMode::Read) {
            Ok(handle) => {
                provider.total_size = handle.size();
                provider.mime_type = mime::from_path(path);
                provider.state = HandleState::Valid(handle);
                provider.ready = true;
                tracing::debug!(
                    path = %path,
                    backend = provider.backend.name(),
                    size = provider.total_size,
                    max_reopen_attempts,
                    "opened fault-tolerant storage provider"
                );
            }
            Err(err) => {
                tracing::warn!(path = %path, backend = provider.backend.name(), error = %err, "failed to open file");
            }
        }
        provider
    }

    /// Open with the default budget of 3 reopen attempts.
    pub fn with_default_budget(backend: Arc<dyn StorageBackend>, path: &str) -> Self {
        Self::open(backend, path, DEFAULT_RETRY_BUDGET)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn retry_state(&self) -> RetryState {
        match self.state {
            HandleState::Valid(_) => RetryState::Valid,
            HandleState::Invalid => RetryState::Invalid,
            HandleState::Exhausted => RetryState::Exhausted,
        }
    }

    /// Reopen attempts made since the last successful read.
    pub fn reopen_attempts(&self) -> u32 {
        self.reopen_attempts
    }

    /// Drop the current handle. Moves to `Exhausted` if no budget remains.
    fn invalidate(&mut self) {
        if let HandleState::Valid(mut handle) = std::mem::replace(&mut self.state, HandleState::Invalid) {
            handle.close();
        }
        if self.reopen_attempts >= self.max_reopen_attempts {
            self.exhaust();
        }
    }

    fn exhaust(&mut self) {
        if !matches!(self.state, HandleState::Exhausted) {
            tracing::warn!(
                path = %self.path,
                attempts = self.reopen_attempts,
                "retry budget exhausted — no further reopen attempts"
            );
        }
        self.state = HandleState::Exhausted;
    }

    /// Make sure a handle is open, reopening if the budget allows.
    fn ensure_open(&mut self) -> bool {
        match self.state {
            HandleState::Valid(_) => return true,
            HandleState::Exhausted => return false,
            HandleState::Invalid => {}
        }

        if self.reopen_attempts >= self.max_reopen_attempts {
            self.exhaust();
            return false;
        }

        self.reopen_attempts += 1;
        match self.backend.open(&self.path, OpenMode::Read) {
            Ok(handle) => {
                tracing::info!(
                    path = %self.path,
                    attempt = self.reopen_attempts,
                    max = self.max_reopen_attempts,
                    "reopened storage handle"
                );
                self.state = HandleState::Valid(handle);
                true
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.path,
                    attempt = self.reopen_attempts,
                    max = self.max_reopen_attempts,
                    error = %err,
                    "reopen failed"
                );
                if self.reopen_attempts >= self.max_reopen_attempts {
                    self.exhaust();
                }
                false
            }
        }
    }

    /// Seek the open handle if it is not already at `offset`.
    fn seek_current(&mut self, offset: u64) -> bool {
        let HandleState::Valid(handle) = &mut self.state else {
            return false;
        };
        if handle.position() == offset {
            return true;
        }
        match handle.seek(offset) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %self.path, offset, error = %err, "seek failed");
                false
            }
        }
    }

    /// Position the handle at `offset`, with one reopen-and-reseek cycle on
    /// seek failure.
    fn seek_to(&mut self, offset: u64) -> bool {
        if !self.ensure_open() {
            return false;
        }
        if self.seek_current(offset) {
            return true;
        }

        self.invalidate();
        if self.ensure_open() && self.seek_current(offset) {
            return true;
        }
        self.invalidate();
        false
    }
}

impl ContentProvider for FaultTolerantStorageProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if !self.ready {
            return 0;
        }
        let len = bounded_len(buf.len(), self.total_size, offset);
        if len == 0 {
            return 0;
        }

        if !self.seek_to(offset) {
            return 0;
        }
        let HandleState::Valid(handle) = &mut self.state else {
            return 0;
        };

        match handle.read(&mut buf[..len]) {
            Ok(0) => {
                tracing::warn!(path = %self.path, offset, "storage returned no data before end of content");
                0
            }
            Ok(n) => {
                if self.reopen_attempts > 0 {
                    tracing::debug!(path = %self.path, attempts = self.reopen_attempts, "read succeeded — retry budget restored");
                    self.reopen_attempts = 0;
                }
                n
            }
            Err(err) => {
                tracing::warn!(path = %self.path, offset, error = %err, "read failed — dropping handle");
                self.invalidate();
                0
            }
        }
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn mime_type(&self) -> &str {
        self.mime_type
    }

    fn reset(&mut self) {
        if !self.ready {
            return;
        }
        if let HandleState::Valid(handle) = &mut self.state {
            if let Err(err) = handle.seek(0) {
                tracing::warn!(path = %self.path, error = %err, "rewind failed — dropping handle");
                self.invalidate();
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

impl Drop for FaultTolerantStorageProvider {
    fn drop(&mut self) {
        if let HandleState::Valid(handle) = &mut self.state {
            handle.close();
        }
    }
}
