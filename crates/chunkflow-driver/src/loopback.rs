//! In-process transport.
//!
//! [`LoopbackTransport`] stores registered producers and serves each one
//! once: [`fetch_to`](LoopbackTransport::fetch_to) pulls chunks into any
//! `io::Write` until the producer returns `0`, then drops the producer.
//! The CLI uses it to write a transfer to a file or stdout, and tests use it
//! as a deterministic stand-in for an HTTP server.

use std::collections::HashMap;
use std::io::{self, Write};

use chunkflow_core::config::DEFAULT_BUFFER_SIZE;

use crate::transport::{ChunkProducer, Method, Transport};

struct Registration {
    producer: ChunkProducer,
    mime_type: String,
    content_length: u64,
}

/// Result of serving one registered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub route: String,
    pub method: Method,
    pub mime_type: String,
    /// Declared length from registration.
    pub content_length: u64,
    /// Bytes actually written.
    pub bytes_written: u64,
    pub chunks: usize,
}

impl FetchSummary {
    /// Whether the producer delivered fewer bytes than it declared.
    pub fn is_short(&self) -> bool {
        self.bytes_written < self.content_length
    }
}

/// Transport that serves registered responses in-process.
pub struct LoopbackTransport {
    routes: HashMap<(Method, String), Registration>,
    available: bool,
    max_chunk: usize,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            available: true,
            max_chunk: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: the most bytes the transport accepts per pull.
    pub fn with_max_chunk(self, max_chunk: usize) -> Self {
        Self { max_chunk, ..self }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Mark the transport up or down.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Registered routes as `(method, route)` pairs, sorted.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<_> = self.routes.keys().cloned().collect();
        routes.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        routes
    }

    pub fn is_registered(&self, method: Method, route: &str) -> bool {
        self.routes.contains_key(&(method, route.to_string()))
    }

    /// Drop the producer for a route without serving it.
    ///
    /// Returns whether a registration was removed.
    pub fn abort(&mut self, method: Method, route: &str) -> bool {
        let removed = self.routes.remove(&(method, route.to_string())).is_some();
        if removed {
            tracing::debug!(route = %route, %method, "aborted registered response");
        }
        removed
    }

    /// Serve `route` into `out`, consuming the registration.
    ///
    /// A request for a concrete method also matches a route registered
    /// with [`Method::Any`]. Returns `Ok(None)` when nothing is registered.
    /// A write error aborts the response and drops the producer.
    pub fn fetch_to<W: Write>(
        &mut self,
        method: Method,
        route: &str,
        out: &mut W,
    ) -> io::Result<Option<FetchSummary>> {
        let Some((method, mut registration)) = self.take(method, route) else {
            tracing::debug!(route = %route, %method, "no response registered");
            return Ok(None);
        };

        let mut buf = vec![0u8; self.max_chunk];
        let mut offset = 0u64;
        let mut chunks = 0usize;

        loop {
            let n = (registration.producer)(&mut buf[..], offset);
            if n == 0 {
                break;
            }
            // A misbehaving producer cannot make us read past the buffer.
            let n = n.min(buf.len());
            out.write_all(&buf[..n])?;
            offset += n as u64;
            chunks += 1;
        }
        out.flush()?;

        let summary = FetchSummary {
            route: route.to_string(),
            method,
            mime_type: registration.mime_type,
            content_length: registration.content_length,
            bytes_written: offset,
            chunks,
        };
        tracing::debug!(
            route = %route,
            bytes = summary.bytes_written,
            chunks = summary.chunks,
            "served response"
        );
        Ok(Some(summary))
    }

    /// Serve `route` into memory.
    pub fn fetch(&mut self, method: Method, route: &str) -> Option<(FetchSummary, Vec<u8>)> {
        let mut body = Vec::new();
        // Writes into a Vec cannot fail.
        match self.fetch_to(method, route, &mut body) {
            Ok(Some(summary)) => Some((summary, body)),
            Ok(None) | Err(_) => None,
        }
    }

    fn take(&mut self, method: Method, route: &str) -> Option<(Method, Registration)> {
        let key = (method, route.to_string());
        if let Some(registration) = self.routes.remove(&key) {
            return Some((method, registration));
        }
        self.routes
            .remove(&(Method::Any, route.to_string()))
            .map(|registration| (Method::Any, registration))
    }
}

impl Transport for LoopbackTransport {
    fn is_available(&self) -> bool {
        self.available
    }

    fn register(
        &mut self,
        route: &str,
        method: Method,
        producer: ChunkProducer,
        mime_type: &str,
        content_length: u64,
    ) -> Result<(), String> {
        if !self.available {
            return Err("loopback transport is down".to_string());
        }
        let previous = self.routes.insert(
            (method, route.to_string()),
            Registration {
                producer,
                mime_type: mime_type.to_string(),
                content_length,
            },
        );
        if previous.is_some() {
            tracing::debug!(route = %route, %method, "replaced registered response");
        }
        Ok(())
    }
}
