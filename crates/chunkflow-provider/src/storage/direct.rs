//! Unbuffered storage-backed provider.

use chunkflow_core::mime;

use super::{OpenMode, StorageBackend, StorageHandle};
use crate::{ContentProvider, bounded_len};

/// Reads straight from a storage handle into the caller's buffer.
///
/// Seeks only when the handle cursor is not already at the requested offset,
/// so a strictly sequential transfer costs one storage read per chunk and no
/// seeks after the first.
#[derive(Debug)]
pub struct DirectStorageProvider {
    path: String,
    mime_type: &'static str,
    handle: Option<Box<dyn StorageHandle>>,
    total_size: u64,
}

impl DirectStorageProvider {
    pub fn open(backend: &dyn StorageBackend, path: &str) -> Self {
        let mut provider = Self {
            path: path.to_string(),
            mime_type: "",
            handle: None,
            total_size: 0,
        };

        if !backend.exists(path) {
            tracing::debug!(path = %path, backend = backend.name(), "file not found");
            return provider;
        }

        match backend.open(path, OpenMode::Read) {
            Ok(handle) => {
                provider.total_size = handle.size();
                provider.mime_type = mime::from_path(path);
                provider.handle = Some(handle);
                tracing::debug!(path = %path, size = provider.total_size, "opened direct storage provider");
            }
            Err(err) => {
                tracing::warn!(path = %path, backend = backend.name(), error = %err, "failed to open file");
            }
        }
        provider
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ContentProvider for DirectStorageProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        let len = bounded_len(buf.len(), self.total_size, offset);
        let Some(handle) = self.handle.as_mut() else {
            return 0;
        };
        if len == 0 {
            return 0;
        }

        if handle.position() != offset {
            if let Err(err) = handle.seek(offset) {
                tracing::warn!(path = %self.path, offset, error = %err, "seek failed — ending read");
                return 0;
            }
        }

        match handle.read(&mut buf[..len]) {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(path = %self.path, offset, error = %err, "read failed — ending read");
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
        if let Some(handle) = self.handle.as_mut() {
            if let Err(err) = handle.seek(0) {
                tracing::warn!(path = %self.path, error = %err, "rewind failed");
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for DirectStorageProvider {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{ScriptedStorage, pattern, read_to_end};

    #[test]
    fn sequential_reads_seek_once() {
        let data = pattern(3000);
        let storage = ScriptedStorage::new("/a.bin", data.clone());
        let mut provider = DirectStorageProvider::open(&storage, "/a.bin");

        let (out, sizes) = read_to_end(&mut provider, 1024);
        assert_eq!(out, data);
        assert_eq!(sizes, vec![1024, 1024, 952]);
        // Cursor starts at 0 and follows the reads.
        assert_eq!(storage.script.seeks(), 0);
    }

    #[test]
    fn random_access_seeks() {
        let data = pattern(3000);
        let storage = ScriptedStorage::new("/a.bin", data.clone());
        let mut provider = DirectStorageProvider::open(&storage, "/a.bin");
        let mut buf = [0u8; 10];

        assert_eq!(provider.read_chunk(&mut buf, 2000), 10);
        assert_eq!(&buf[..], &data[2000..2010]);
        assert_eq!(provider.read_chunk(&mut buf, 2010), 10);
        assert_eq!(storage.script.seeks(), 1);
    }

    #[test]
    fn failures_end_the_read() {
        let storage = ScriptedStorage::new("/a.bin", pattern(100));
        let mut provider = DirectStorageProvider::open(&storage, "/a.bin");

        storage.script.set_fail_seek(true);
        assert_eq!(provider.read_chunk(&mut [0u8; 8], 50), 0);

        storage.script.set_fail_seek(false);
        storage.script.set_fail_read(true);
        assert_eq!(provider.read_chunk(&mut [0u8; 8], 50), 0);
    }

    #[test]
    fn reset_rewinds_handle() {
        let storage = ScriptedStorage::new("/a.bin", pattern(100));
        let mut provider = DirectStorageProvider::open(&storage, "/a.bin");
        provider.read_chunk(&mut [0u8; 8], 0);
        provider.reset();
        provider.read_chunk(&mut [0u8; 8], 0);
        assert_eq!(storage.script.seeks(), 1);
    }

    #[test]
    fn missing_file_is_not_ready() {
        let provider = DirectStorageProvider::open(&MemoryStorage::new("flash"), "/x.css");
        assert!(!provider.is_ready());
        assert_eq!(provider.mime_type(), "");
    }
}
