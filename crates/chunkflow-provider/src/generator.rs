//! On-demand content generator.

use std::fmt;

use crate::{ContentProvider, bounded_len};

type GenerateFn = Box<dyn FnMut(&mut [u8], u64) -> usize + Send>;

/// Delegates chunk production to a closure of `(buffer, offset)`.
///
/// The declared total size is used for reporting (Content-Length) and to
/// bound the buffer handed to the closure; the closure itself decides when
/// to stop. Returning `0` ends the stream even if it is short of the
/// declared total.
///
/// `reset()` does nothing: a stateful generator owns its own rewind logic.
pub struct GeneratorProvider {
    generate: GenerateFn,
    total_size: u64,
    mime_type: String,
}

impl GeneratorProvider {
    pub fn new<F>(generate: F, total_size: u64, mime_type: impl Into<String>) -> Self
    where
        F: FnMut(&mut [u8], u64) -> usize + Send + 'static,
    {
        Self {
            generate: Box::new(generate),
            total_size,
            mime_type: mime_type.into(),
        }
    }

    /// Build a generator that threads a state value through every call.
    pub fn stateful<S, F>(
        mut state: S,
        mut generate: F,
        total_size: u64,
        mime_type: impl Into<String>,
    ) -> Self
    where
        S: Send + 'static,
        F: FnMut(&mut S, &mut [u8], u64) -> usize + Send + 'static,
    {
        Self::new(
            move |buf: &mut [u8], offset| generate(&mut state, buf, offset),
            total_size,
            mime_type,
        )
    }
}

impl fmt::Debug for GeneratorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorProvider")
            .field("total_size", &self.total_size)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

impl ContentProvider for GeneratorProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        let len = bounded_len(buf.len(), self.total_size, offset);
        if len == 0 {
            return 0;
        }
        let written = (self.generate)(&mut buf[..len], offset);
        if written > len {
            tracing::warn!(
                offset,
                written,
                capacity = len,
                "generator reported more bytes than it was given — clamping"
            );
            return len;
        }
        written
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn reset(&mut self) {}

    fn is_ready(&self) -> bool {
        true
    }
}
