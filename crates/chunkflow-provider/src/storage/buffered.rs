//! Storage-backed provider with a read-ahead cache window.
//!
//! Sequential streaming asks for many small chunks in a row. Instead of one
//! storage round trip per chunk, the provider reads `capacity` bytes at a
//! time into a cache window and serves chunks from it until the requested
//! offset leaves the window.
//!
//! ```text
//! read_chunk(offset)
//!   → offset in [window_offset, window_offset + window_len) → copy from cache
//!   → otherwise → seek(offset) + one read of up to `capacity` bytes → copy
//! ```

use chunkflow_core::config::DEFAULT_CACHE_SIZE;
use chunkflow_core::mime;

use super::{OpenMode, StorageBackend, StorageHandle};
use crate::{ContentProvider, bounded_len};

/// Buffered provider over a single storage handle.
#[derive(Debug)]
pub struct BufferedStorageProvider {
    path: String,
    mime_type: &'static str,
    handle: Option<Box<dyn StorageHandle>>,
    total_size: u64,
    /// Cache storage; its length is the window capacity.
    cache: Vec<u8>,
    /// Composite offset of `cache[0]`.
    window_offset: u64,
    /// Valid bytes in `cache`, always `<= cache.len()`.
    window_len: usize,
    /// The last refill reached the end of the content.
    eof: bool,
    ready: bool,
}

impl BufferedStorageProvider {
    /// Open `path` on `backend` with a cache window of `cache_size` bytes.
    ///
    /// The provider is not ready if the path does not exist, cannot be
    /// opened, `cache_size` is zero, or the cache cannot be allocated.
    pub fn open(backend: &dyn StorageBackend, path: &str, cache_size: usize) -> Self {
        let mut provider = Self {
            path: path.to_string(),
            mime_type: "",
            handle: None,
            total_size: 0,
            cache: Vec::new(),
            window_offset: 0,
            window_len: 0,
            eof: false,
            ready: false,
        };

        if cache_size == 0 {
            tracing::warn!(path = %path, "buffered provider needs a non-zero cache size");
            return provider;
        }
        if !backend.exists(path) {
            tracing::debug!(path = %path, backend = backend.name(), "file not found");
            return provider;
        }

        let handle = match backend.open(path, OpenMode::Read) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(path = %path, backend = backend.name(), error = %err, "failed to open file");
                return provider;
            }
        };

        if provider.cache.try_reserve_exact(cache_size).is_err() {
            tracing::warn!(path = %path, cache_size, "failed to allocate cache window");
            let mut handle = handle;
            handle.close();
            return provider;
        }
        provider.cache.resize(cache_size, 0);

        provider.total_size = handle.size();
        provider.mime_type = mime::from_path(path);
        provider.handle = Some(handle);
        provider.ready = true;

        tracing::debug!(
            path = %path,
            backend = backend.name(),
            size = provider.total_size,
            cache_size,
            "opened buffered storage provider"
        );
        provider
    }

    /// Open with the default 4 KB cache window.
    pub fn with_default_cache(backend: &dyn StorageBackend, path: &str) -> Self {
        Self::open(backend, path, DEFAULT_CACHE_SIZE)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current cache window as `(offset, len)`.
    pub fn window(&self) -> (u64, usize) {
        (self.window_offset, self.window_len)
    }

    pub fn capacity(&self) -> usize {
        self.cache.len()
    }

    /// Whether the last refill reached the end of the content.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    fn window_contains(&self, offset: u64) -> bool {
        offset >= self.window_offset && offset - self.window_offset < self.window_len as u64
    }

    /// Seek to `offset` and refill the window. On failure the previous
    /// window is left untouched.
    fn refill(&mut self, offset: u64) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };

        if let Err(err) = handle.seek(offset) {
            tracing::warn!(path = %self.path, offset, error = %err, "seek failed — ending read");
            return false;
        }

        match handle.read(&mut self.cache) {
            Ok(0) => {
                self.eof = true;
                tracing::warn!(
                    path = %self.path,
                    offset,
                    total_size = self.total_size,
                    "storage returned no data before end of content"
                );
                false
            }
            Ok(n) => {
                self.window_offset = offset;
                self.window_len = n;
                self.eof = offset + n as u64 >= self.total_size;
                tracing::debug!(path = %self.path, offset, len = n, eof = self.eof, "refilled cache window");
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path, offset, error = %err, "read failed — ending read");
                false
            }
        }
    }
}

impl ContentProvider for BufferedStorageProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if !self.ready || buf.is_empty() || offset >= self.total_size {
            return 0;
        }

        if !self.window_contains(offset) && !self.refill(offset) {
            return 0;
        }

        let index = (offset - self.window_offset) as usize;
        let available = self.window_len - index;
        let n = bounded_len(buf.len().min(available), self.total_size, offset);
        buf[..n].copy_from_slice(&self.cache[index..index + n]);
        n
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
        if let Some(handle) = self.handle.as_mut() {
            if let Err(err) = handle.seek(0) {
                tracing::warn!(path = %self.path, error = %err, "rewind failed");
            }
        }
        self.window_offset = 0;
        self.window_len = 0;
        self.eof = false;
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

impl Drop for BufferedStorageProvider {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
            tracing::debug!(path = %self.path, "closed buffered storage provider");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{ScriptedStorage, pattern, read_to_end};

    #[test]
    fn sequential_reads_cover_total_size() {
        let data = pattern(10_000);
        let storage = MemoryStorage::new("flash").with_file("/big.bin", data.clone());
        let mut provider = BufferedStorageProvider::open(&storage, "/big.bin", 4096);

        assert!(provider.is_ready());
        assert_eq!(provider.mime_type(), "application/octet-stream");
        let (out, _) = read_to_end(&mut provider, 1000);
        assert_eq!(out.len() as u64, provider.total_size());
        assert_eq!(out, data);
        assert!(provider.is_eof());
    }

    #[test]
    fn in_window_reads_do_not_seek() {
        let storage = ScriptedStorage::new("/a.bin", pattern(10_000));
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 4096);
        let mut buf = [0u8; 512];

        assert_eq!(provider.read_chunk(&mut buf, 0), 512);
        assert_eq!(storage.script.seeks(), 1);
        assert_eq!(provider.window(), (0, 4096));

        // In-window reads in any direction hit the cache.
        assert_eq!(provider.read_chunk(&mut buf, 512), 512);
        assert_eq!(provider.read_chunk(&mut buf, 100), 512);
        assert_eq!(provider.read_chunk(&mut buf, 4095), 1);
        assert_eq!(buf[0], (4095 % 251) as u8);
        assert_eq!(storage.script.seeks(), 1);
        assert_eq!(storage.script.reads(), 1);
    }

    #[test]
    fn out_of_window_read_seeks_once() {
        let data = pattern(10_000);
        let storage = ScriptedStorage::new("/a.bin", data.clone());
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 4096);
        let mut buf = [0u8; 512];

        provider.read_chunk(&mut buf, 0);
        let seeks = storage.script.seeks();
        let reads = storage.script.reads();

        assert_eq!(provider.read_chunk(&mut buf, 7000), 512);
        assert_eq!(&buf[..], &data[7000..7512]);
        assert_eq!(storage.script.seeks(), seeks + 1);
        assert_eq!(storage.script.reads(), reads + 1);
        assert_eq!(provider.window(), (7000, 3000));
        assert!(provider.is_eof());
    }

    #[test]
    fn chunk_is_limited_to_window_remainder() {
        let storage = ScriptedStorage::new("/a.bin", pattern(10_000));
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 1024);
        let mut buf = [0u8; 2048];

        assert_eq!(provider.read_chunk(&mut buf, 1000), 1024);
        assert_eq!(provider.read_chunk(&mut buf, 2000), 24);
    }

    #[test]
    fn seek_failure_keeps_previous_window() {
        let storage = ScriptedStorage::new("/a.bin", pattern(10_000));
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 4096);
        let mut buf = [0u8; 256];

        provider.read_chunk(&mut buf, 0);
        storage.script.set_fail_seek(true);

        assert_eq!(provider.read_chunk(&mut buf, 8000), 0);
        assert_eq!(provider.window(), (0, 4096));
        // The old window still serves.
        assert_eq!(provider.read_chunk(&mut buf, 256), 256);
    }

    #[test]
    fn read_failure_keeps_previous_window() {
        let storage = ScriptedStorage::new("/a.bin", pattern(10_000));
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 4096);
        let mut buf = [0u8; 256];

        provider.read_chunk(&mut buf, 0);
        storage.script.set_fail_read(true);

        assert_eq!(provider.read_chunk(&mut buf, 5000), 0);
        assert_eq!(provider.window(), (0, 4096));
    }

    #[test]
    fn reset_invalidates_window() {
        let storage = ScriptedStorage::new("/a.bin", pattern(10_000));
        let mut provider = BufferedStorageProvider::open(&storage, "/a.bin", 4096);
        let mut buf = [0u8; 256];

        provider.read_chunk(&mut buf, 6000);
        provider.reset();
        assert_eq!(provider.window(), (0, 0));
        assert!(!provider.is_eof());
        assert_eq!(provider.total_size(), 10_000);

        let seeks = storage.script.seeks();
        provider.read_chunk(&mut buf, 0);
        assert_eq!(storage.script.seeks(), seeks + 1);
    }

    #[test]
    fn missing_file_is_not_ready() {
        let storage = MemoryStorage::new("flash");
        let mut provider = BufferedStorageProvider::with_default_cache(&storage, "/nope.txt");
        assert!(!provider.is_ready());
        assert_eq!(provider.total_size(), 0);
        assert_eq!(provider.mime_type(), "");
        assert_eq!(provider.read_chunk(&mut [0u8; 16], 0), 0);
    }

    #[test]
    fn unopenable_file_is_not_ready() {
        let storage = ScriptedStorage::new("/a.bin", pattern(16));
        storage.script.set_fail_open(true);
        let provider = BufferedStorageProvider::open(&storage, "/a.bin", 64);
        assert!(!provider.is_ready());
    }

    #[test]
    fn zero_cache_is_not_ready() {
        let storage = MemoryStorage::new("flash").with_file("/a.txt", &b"abc"[..]);
        let provider = BufferedStorageProvider::open(&storage, "/a.txt", 0);
        assert!(!provider.is_ready());
    }

    #[test]
    fn mime_type_comes_from_extension() {
        let storage = MemoryStorage::new("flash").with_file("/www/index.html", &b"<p>hi</p>"[..]);
        let provider = BufferedStorageProvider::with_default_cache(&storage, "/www/index.html");
        assert_eq!(provider.mime_type(), "text/html");
        assert_eq!(provider.capacity(), DEFAULT_CACHE_SIZE);
    }
}
