//! Test doubles shared by the provider unit tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;

use crate::ContentProvider;
use crate::storage::{OpenMode, StorageBackend, StorageHandle};

/// Read a provider from offset 0 until it returns 0, `chunk` bytes at a time.
///
/// Returns the concatenated bytes and the size of every non-empty chunk.
pub fn read_to_end(provider: &mut dyn ContentProvider, chunk: usize) -> (Vec<u8>, Vec<usize>) {
    let mut out = Vec::new();
    let mut sizes = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = provider.read_chunk(&mut buf, out.len() as u64);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        sizes.push(n);
    }
    (out, sizes)
}

/// Shared counters and fault switches for [`ScriptedStorage`].
#[derive(Debug, Default)]
pub struct Script {
    pub opens: AtomicUsize,
    pub seeks: AtomicUsize,
    pub reads: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_seek: AtomicBool,
    pub fail_read: AtomicBool,
}

impl Script {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }
}

/// Single-file backend that counts operations and fails on demand.
///
/// Every handle it opens consults the same [`Script`], so faults can be
/// switched on and off while a provider holds a handle.
#[derive(Debug, Clone)]
pub struct ScriptedStorage {
    path: String,
    data: Bytes,
    pub script: Arc<Script>,
}

impl ScriptedStorage {
    pub fn new(path: &str, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.to_string(),
            data: data.into(),
            script: Arc::new(Script::default()),
        }
    }
}

impl StorageBackend for ScriptedStorage {
    fn name(&self) -> &str {
        "scripted"
    }

    fn exists(&self, path: &str) -> bool {
        path == self.path
    }

    fn open(&self, path: &str, _mode: OpenMode) -> io::Result<Box<dyn StorageHandle>> {
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        if path != self.path {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()));
        }
        if self.script.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::other("card not responding"));
        }
        Ok(Box::new(ScriptedHandle {
            data: self.data.clone(),
            position: 0,
            script: Arc::clone(&self.script),
        }))
    }
}

#[derive(Debug)]
struct ScriptedHandle {
    data: Bytes,
    position: u64,
    script: Arc<Script>,
}

impl StorageHandle for ScriptedHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.script.reads.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_read.load(Ordering::SeqCst) {
            return Err(io::Error::other("read error"));
        }
        let n = crate::bounded_len(buf.len(), self.data.len() as u64, self.position);
        let start = self.position as usize;
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.script.seeks.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_seek.load(Ordering::SeqCst) {
            return Err(io::Error::other("seek error"));
        }
        self.position = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn close(&mut self) {}
}

/// Deterministic test payload: byte `i` is `i % 251`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
