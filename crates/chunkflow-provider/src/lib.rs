//! Pull-based content providers.
//!
//! A [`ContentProvider`] is one logical, finite byte sequence with a known
//! total size and a single MIME type. The host asks for the chunk at a given
//! offset; the provider copies at most `buf.len()` bytes into the caller's
//! buffer and returns how many it wrote. A return of `0` ends the stream.
//!
//! # Providers
//!
//! ```text
//! MemoryProvider            fixed in-memory bytes (borrowed, owned, or shared)
//! GeneratorProvider         bytes computed on demand by a closure
//! MultiPartProvider         ordered concatenation of other providers
//! PassThroughProvider       encoding wrapper point, forwards unchanged
//! BufferedStorageProvider   storage handle + read-ahead cache window
//! DirectStorageProvider     storage handle, reads straight into the caller's buffer
//! FaultTolerantStorageProvider  storage handle with a bounded reopen budget
//! ```
//!
//! Storage-backed providers are usually built through [`ProviderFactory`],
//! which picks a backend for a path.

pub mod factory;
pub mod generator;
pub mod memory;
pub mod multipart;
pub mod passthrough;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use factory::{BackendHint, ProviderFactory};
pub use generator::GeneratorProvider;
pub use memory::MemoryProvider;
pub use multipart::MultiPartProvider;
pub use passthrough::{ContentEncoding, PassThroughProvider};
pub use storage::buffered::BufferedStorageProvider;
pub use storage::direct::DirectStorageProvider;
pub use storage::fault_tolerant::FaultTolerantStorageProvider;
pub use storage::{LocalStorage, MemoryStorage, OpenMode, StorageBackend, StorageHandle};

/// The capability set every content producer implements.
///
/// # Contract
///
/// - `read_chunk` never writes more than `buf.len()` bytes and never reads
///   past `total_size()`.
/// - `offset >= total_size()` or an empty `buf` returns `0` with no side effects.
/// - While `is_ready()` is false, every other method is a no-op returning a
///   zero or empty value.
/// - `reset()` restores cursors and caches to their state at construction
///   without changing `total_size()` or `mime_type()`.
///
/// A provider must return the bytes for the requested offset regardless of
/// which offset it served last; callers are free to seek.
pub trait ContentProvider: Send {
    /// Copy the bytes at `offset` into `buf`. Returns the number written.
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize;

    /// Total content length in bytes.
    fn total_size(&self) -> u64;

    /// MIME type of the content.
    fn mime_type(&self) -> &str;

    /// Rewind internal state to the beginning.
    fn reset(&mut self);

    /// Whether the provider can serve reads.
    fn is_ready(&self) -> bool;
}

impl<P: ContentProvider + ?Sized> ContentProvider for Box<P> {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        (**self).read_chunk(buf, offset)
    }

    fn total_size(&self) -> u64 {
        (**self).total_size()
    }

    fn mime_type(&self) -> &str {
        (**self).mime_type()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Number of bytes a read of `buf_len` at `offset` may return without
/// passing `total`. Zero when `offset` is at or past the end.
pub(crate) fn bounded_len(buf_len: usize, total: u64, offset: u64) -> usize {
    if offset >= total {
        return 0;
    }
    let remaining = total - offset;
    usize::try_from(remaining).map_or(buf_len, |r| r.min(buf_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_len_clamps_to_remaining() {
        assert_eq!(bounded_len(7, 20, 14), 6);
        assert_eq!(bounded_len(7, 20, 0), 7);
        assert_eq!(bounded_len(7, 20, 20), 0);
        assert_eq!(bounded_len(7, 20, 25), 0);
        assert_eq!(bounded_len(0, 20, 0), 0);
    }

    #[test]
    fn boxed_provider_forwards() {
        let mut boxed: Box<dyn ContentProvider> =
            Box::new(MemoryProvider::from_static(b"hello", "text/plain"));
        let mut buf = [0u8; 8];

        assert!(boxed.is_ready());
        assert_eq!(boxed.total_size(), 5);
        assert_eq!(boxed.mime_type(), "text/plain");
        assert_eq!(boxed.read_chunk(&mut buf, 1), 4);
        assert_eq!(&buf[..4], b"ello");
    }
}
