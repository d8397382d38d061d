//! Storage backend interfaces and the two bundled backends.
//!
//! A [`StorageBackend`] answers existence checks and opens [`StorageHandle`]s.
//! Handles are positioned byte readers: `seek` moves the cursor, `read`
//! copies from the cursor and advances it.
//!
//! - [`LocalStorage`] serves files under a root directory on the host
//!   filesystem. Registered as the flash backend it stands in for the primary
//!   on-board filesystem; registered as the removable backend it stands in
//!   for an SD card mount.
//! - [`MemoryStorage`] serves an immutable path → bytes table.

pub mod buffered;
pub mod direct;
pub mod fault_tolerant;

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

/// How a storage target is opened. Providers only ever read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
}

/// An open storage target with a read cursor.
pub trait StorageHandle: Send + fmt::Debug {
    /// Read up to `buf.len()` bytes at the cursor, advancing it.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Move the cursor to an absolute offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;
    /// Current cursor position.
    fn position(&self) -> u64;
    /// Size of the target in bytes.
    fn size(&self) -> u64;
    /// Release the underlying resource. Later reads and seeks fail.
    fn close(&mut self);
}

/// A filesystem-like source of storage handles.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Backend name used in logs (e.g. `"flash"`, `"sd"`).
    fn name(&self) -> &str;
    /// Whether `path` names an existing target.
    fn exists(&self, path: &str) -> bool;
    /// Open `path`.
    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn StorageHandle>>;
}

fn closed_error() -> io::Error {
    io::Error::other("storage handle is closed")
}

// ── LocalStorage ────────────────────────────────────────────────────

/// Backend serving files under a root directory.
///
/// Paths are interpreted relative to the root; a leading `/` is ignored.
/// Paths containing `..` or other non-normal components are rejected.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    name: String,
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }
}

impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_some_and(|p| p.is_file())
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn StorageHandle>> {
        let OpenMode::Read = mode;
        let resolved = self.resolve(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid path: {path}"))
        })?;
        let file = File::open(&resolved)?;
        let size = file.metadata()?.len();
        Ok(Box::new(LocalHandle {
            file: Some(file),
            position: 0,
            size,
        }))
    }
}

#[derive(Debug)]
struct LocalHandle {
    file: Option<File>,
    position: u64,
    size: u64,
}

impl StorageHandle for LocalHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        let n = file.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        self.position = file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn close(&mut self) {
        self.file = None;
    }
}

// ── MemoryStorage ───────────────────────────────────────────────────

/// Backend serving an immutable table of in-memory files.
///
/// Keys are normalized to start with `/`.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    name: String,
    files: HashMap<String, Bytes>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: HashMap::new(),
        }
    }

    /// Builder method: add a file.
    pub fn with_file(mut self, path: &str, content: impl Into<Bytes>) -> Self {
        self.files.insert(normalize_key(path), content.into());
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize_key(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_key(path))
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn StorageHandle>> {
        let OpenMode::Read = mode;
        let data = self.files.get(&normalize_key(path)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })?;
        Ok(Box::new(MemoryHandle {
            data: Some(data),
            position: 0,
        }))
    }
}

#[derive(Debug)]
struct MemoryHandle {
    data: Option<Bytes>,
    position: u64,
}

impl StorageHandle for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.as_ref().ok_or_else(closed_error)?;
        let n = crate::bounded_len(buf.len(), data.len() as u64, self.position);
        let start = self.position as usize;
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        let data = self.data.as_ref().ok_or_else(closed_error)?;
        if offset > data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {offset} past end ({})", data.len()),
            ));
        }
        self.position = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.data.as_ref().map_or(0, |d| d.len() as u64)
    }

    fn close(&mut self) {
        self.data = None;
    }
}
