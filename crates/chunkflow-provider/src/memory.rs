//! In-memory content provider.

use bytes::Bytes;

use crate::{ContentProvider, bounded_len};

/// Serves bytes from a fixed in-memory region.
///
/// The region is held as [`Bytes`], so it can be a borrowed `'static` slice
/// ([`from_static`]), an owned buffer released when the provider is dropped
/// ([`from_vec`]), or a slice of a shared allocation ([`from_bytes`]).
/// An empty region is never ready.
///
/// [`from_static`]: MemoryProvider::from_static
/// [`from_vec`]: MemoryProvider::from_vec
/// [`from_bytes`]: MemoryProvider::from_bytes
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    data: Bytes,
    mime_type: String,
}

impl MemoryProvider {
    /// Borrow a `'static` region (flash-resident assets, string literals).
    pub fn from_static(data: &'static [u8], mime_type: impl Into<String>) -> Self {
        Self::from_bytes(Bytes::from_static(data), mime_type)
    }

    /// Take ownership of a buffer.
    pub fn from_vec(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::from_bytes(Bytes::from(data), mime_type)
    }

    /// Share an existing allocation.
    pub fn from_bytes(data: Bytes, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

impl ContentProvider for MemoryProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if !self.is_ready() {
            return 0;
        }
        let n = bounded_len(buf.len(), self.data.len() as u64, offset);
        if n == 0 {
            return 0;
        }
        let start = offset as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn mime_type(&self) -> &str {
        if self.is_ready() { &self.mime_type } else { "" }
    }

    fn reset(&mut self) {}

    fn is_ready(&self) -> bool {
        !self.data.is_empty()
    }
}
