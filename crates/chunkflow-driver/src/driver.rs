//! Transfer orchestration.
//!
//! ```text
//! begin_transfer(route, provider)
//!   → validate route, provider, buffer size, transport
//!   → StreamingContext { provider, totals, counters }   (Arc<Mutex<_>>)
//!   → transport.register(route, producer)               producer owns one Arc
//!   → TransferHandle                                    caller owns the other
//!
//! transport pulls producer(buf, offset)
//!   → provider.read_chunk(buf[..min(buffer_size, buf.len())], offset)
//!   → counters + progress callback
//!   → 0 ends the transfer and releases the provider
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chunkflow_core::config::{DEFAULT_BUFFER_SIZE, DEFAULT_TIMEOUT, validate_buffer_size};
use chunkflow_core::{StreamError, StreamResult, StreamingSettings};
use chunkflow_provider::{BackendHint, ContentProvider, GeneratorProvider, ProviderFactory};

use crate::context::{ProducerState, ProgressCallback, StreamingContext, TransferHandle};
use crate::transport::{Method, Transport};

/// Per-transfer overrides.
#[derive(Default)]
pub struct TransferOptions {
    /// Overrides the driver's buffer size; validated the same way.
    pub buffer_size: Option<usize>,
    pub progress: Option<ProgressCallback>,
}

impl TransferOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the per-transfer buffer size.
    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self {
            buffer_size: Some(buffer_size),
            ..self
        }
    }

    /// Builder method: set the progress callback.
    pub fn with_progress<F>(self, progress: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        Self {
            progress: Some(Box::new(progress)),
            ..self
        }
    }
}

impl std::fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferOptions")
            .field("buffer_size", &self.buffer_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Drives providers through a [`Transport`].
pub struct StreamingDriver<T: Transport> {
    transport: T,
    buffer_size: usize,
    timeout: Duration,
    factory: ProviderFactory,
    transfers_started: u64,
}

impl<T: Transport> StreamingDriver<T> {
    /// Driver with the default 4 KB buffer and 30 s timeout.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
            factory: ProviderFactory::new(),
            transfers_started: 0,
        }
    }

    /// Driver from validated settings. The buffer size is checked again.
    pub fn with_settings(transport: T, settings: &StreamingSettings) -> StreamResult<Self> {
        let mut driver = Self::new(transport);
        driver.configure_buffer_size(settings.buffer_size)?;
        driver.set_timeout(settings.timeout);
        Ok(driver)
    }

    /// Builder method: the factory used by [`stream_file`](Self::stream_file).
    pub fn with_factory(self, factory: ProviderFactory) -> Self {
        Self { factory, ..self }
    }

    /// Set the default buffer size for subsequent transfers.
    ///
    /// Sizes outside `[MIN_BUFFER_SIZE, MAX_BUFFER_SIZE]` are rejected and
    /// leave the current value in place.
    pub fn configure_buffer_size(&mut self, size: usize) -> StreamResult<()> {
        self.buffer_size = validate_buffer_size(size)?;
        tracing::debug!(buffer_size = size, "configured buffer size");
        Ok(())
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Set the timeout for subsequent transfers. `Duration::ZERO` disables it.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn factory(&self) -> &ProviderFactory {
        &self.factory
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Number of transfers successfully registered.
    pub fn transfers_started(&self) -> u64 {
        self.transfers_started
    }

    /// Take ownership of `provider` and register it with the transport.
    pub fn begin_transfer(
        &mut self,
        route: &str,
        method: Method,
        provider: Option<Box<dyn ContentProvider>>,
        options: TransferOptions,
    ) -> StreamResult<TransferHandle> {
        if route.is_empty() {
            return Err(StreamError::InvalidParameter("empty route".to_string()));
        }
        let Some(provider) = provider else {
            return Err(StreamError::InvalidParameter(format!("no content provider for {route}")));
        };
        let buffer_size = match options.buffer_size {
            Some(size) => validate_buffer_size(size)?,
            None => self.buffer_size,
        };
        if !provider.is_ready() {
            return Err(StreamError::ProviderError(format!("content provider for {route} is not ready")));
        }
        if !self.transport.is_available() {
            return Err(StreamError::TransportError("transport is not available".to_string()));
        }

        let context = StreamingContext::new(route, provider, buffer_size, self.timeout);
        let total_size = context.total_size();
        let mime_type = context.mime_type().to_string();
        let context = Arc::new(Mutex::new(context));

        let mut producer = ProducerState::new(Arc::clone(&context), options.progress);
        self.transport
            .register(
                route,
                method,
                Box::new(move |buf: &mut [u8], offset: u64| producer.pull(buf, offset)),
                &mime_type,
                total_size,
            )
            .map_err(StreamError::TransportError)?;

        self.transfers_started += 1;
        tracing::info!(
            route = %route,
            %method,
            total_size,
            mime_type = %mime_type,
            buffer_size,
            "transfer started"
        );
        Ok(TransferHandle::new(context))
    }

    /// Stream any provider.
    pub fn stream_provider<P: ContentProvider + 'static>(
        &mut self,
        route: &str,
        method: Method,
        provider: P,
        options: TransferOptions,
    ) -> StreamResult<TransferHandle> {
        self.begin_transfer(route, method, Some(Box::new(provider)), options)
    }

    /// Stream bytes produced on demand by `generate`.
    pub fn stream_generator<F>(
        &mut self,
        route: &str,
        method: Method,
        generate: F,
        total_size: u64,
        mime_type: &str,
        options: TransferOptions,
    ) -> StreamResult<TransferHandle>
    where
        F: FnMut(&mut [u8], u64) -> usize + Send + 'static,
    {
        let provider = GeneratorProvider::new(generate, total_size, mime_type);
        self.stream_provider(route, method, provider, options)
    }

    /// Stream a file located through the driver's [`ProviderFactory`].
    pub fn stream_file(
        &mut self,
        route: &str,
        method: Method,
        path: &str,
        hint: BackendHint,
        options: TransferOptions,
    ) -> StreamResult<TransferHandle> {
        if route.is_empty() {
            return Err(StreamError::InvalidParameter("empty route".to_string()));
        }
        let provider = self.factory.try_create(path, hint).inspect_err(|err| {
            tracing::warn!(route = %route, path = %path, error = %err, "could not open file for streaming");
        })?;
        self.begin_transfer(route, method, Some(provider), options)
    }
}
