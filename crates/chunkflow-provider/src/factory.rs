//! Storage-backed provider construction.
//!
//! [`ProviderFactory`] knows the host's storage backends and picks the
//! provider flavor for each:
//!
//! ```text
//! BackendHint::Flash       → BufferedStorageProvider      on the flash backend
//! BackendHint::Unbuffered  → DirectStorageProvider        on the flash backend
//! BackendHint::Removable   → FaultTolerantStorageProvider on the removable backend
//! BackendHint::Custom(b)   → BufferedStorageProvider      on `b`
//! BackendHint::Auto        → first of [flash, removable] where the path exists
//! ```

use std::fmt;
use std::sync::Arc;

use chunkflow_core::config::{DEFAULT_CACHE_SIZE, DEFAULT_RETRY_BUDGET};
use chunkflow_core::{StorageSettings, StreamError, StreamResult};

use crate::ContentProvider;
use crate::storage::buffered::BufferedStorageProvider;
use crate::storage::direct::DirectStorageProvider;
use crate::storage::fault_tolerant::FaultTolerantStorageProvider;
use crate::storage::{LocalStorage, StorageBackend};

/// Which backend (and provider flavor) to use for a path.
#[derive(Clone, Default)]
pub enum BackendHint {
    /// Probe flash, then removable storage.
    #[default]
    Auto,
    /// Primary flash filesystem, buffered reads.
    Flash,
    /// Primary flash filesystem, unbuffered reads.
    Unbuffered,
    /// Removable storage, with reopen on failure.
    Removable,
    /// A caller-supplied backend, buffered reads.
    Custom(Arc<dyn StorageBackend>),
}

impl fmt::Debug for BackendHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendHint::Auto => write!(f, "Auto"),
            BackendHint::Flash => write!(f, "Flash"),
            BackendHint::Unbuffered => write!(f, "Unbuffered"),
            BackendHint::Removable => write!(f, "Removable"),
            BackendHint::Custom(backend) => write!(f, "Custom({})", backend.name()),
        }
    }
}

/// Builds storage-backed providers for paths.
#[derive(Clone, Debug)]
pub struct ProviderFactory {
    flash: Option<Arc<dyn StorageBackend>>,
    removable: Option<Arc<dyn StorageBackend>>,
    cache_size: usize,
    retry_budget: u32,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self {
            flash: None,
            removable: None,
            cache_size: DEFAULT_CACHE_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a factory with [`LocalStorage`] backends for the configured roots.
    pub fn from_settings(settings: &StorageSettings) -> Self {
        let mut factory = Self::new()
            .with_cache_size(settings.cache_size)
            .with_retry_budget(settings.retry_budget);
        if let Some(root) = &settings.flash_root {
            factory = factory.with_flash(Arc::new(LocalStorage::new("flash", root.clone())));
        }
        if let Some(root) = &settings.removable_root {
            factory = factory.with_removable(Arc::new(LocalStorage::new("sd", root.clone())));
        }
        factory
    }

    /// Builder method: set the primary flash backend.
    pub fn with_flash(self, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            flash: Some(backend),
            ..self
        }
    }

    /// Builder method: set the removable storage backend.
    pub fn with_removable(self, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            removable: Some(backend),
            ..self
        }
    }

    /// Builder method: set the cache window for buffered providers.
    pub fn with_cache_size(self, cache_size: usize) -> Self {
        Self { cache_size, ..self }
    }

    /// Builder method: set the reopen budget for removable-storage providers.
    pub fn with_retry_budget(self, retry_budget: u32) -> Self {
        Self {
            retry_budget,
            ..self
        }
    }

    /// Build a ready provider for `path`, or `None`.
    pub fn create(&self, path: &str, hint: BackendHint) -> Option<Box<dyn ContentProvider>> {
        self.try_create(path, hint).ok()
    }

    /// Build a ready provider for `path`.
    ///
    /// Fails with [`StreamError::NotFound`] when no candidate backend has the
    /// path, and [`StreamError::ProviderError`] when the backend is missing
    /// or the provider could not be opened.
    pub fn try_create(&self, path: &str, hint: BackendHint) -> StreamResult<Box<dyn ContentProvider>> {
        if path.is_empty() {
            return Err(StreamError::InvalidParameter("empty path".to_string()));
        }

        let provider: Box<dyn ContentProvider> = match hint {
            BackendHint::Flash => {
                let backend = require(&self.flash, "flash")?;
                ensure_exists(backend.as_ref(), path)?;
                Box::new(BufferedStorageProvider::open(backend.as_ref(), path, self.cache_size))
            }
            BackendHint::Unbuffered => {
                let backend = require(&self.flash, "flash")?;
                ensure_exists(backend.as_ref(), path)?;
                Box::new(DirectStorageProvider::open(backend.as_ref(), path))
            }
            BackendHint::Removable => {
                let backend = require(&self.removable, "removable")?;
                ensure_exists(backend.as_ref(), path)?;
                Box::new(FaultTolerantStorageProvider::open(
                    Arc::clone(backend),
                    path,
                    self.retry_budget,
                ))
            }
            BackendHint::Custom(backend) => {
                ensure_exists(backend.as_ref(), path)?;
                Box::new(BufferedStorageProvider::open(backend.as_ref(), path, self.cache_size))
            }
            BackendHint::Auto => return self.probe(path),
        };

        ready_or_error(provider, path)
    }

    /// Try each backend in priority order; the first that has `path` wins.
    fn probe(&self, path: &str) -> StreamResult<Box<dyn ContentProvider>> {
        if let Some(flash) = &self.flash {
            if flash.exists(path) {
                tracing::debug!(path = %path, backend = flash.name(), "auto-detect matched flash storage");
                let provider = BufferedStorageProvider::open(flash.as_ref(), path, self.cache_size);
                return ready_or_error(Box::new(provider), path);
            }
        }
        if let Some(removable) = &self.removable {
            if removable.exists(path) {
                tracing::debug!(path = %path, backend = removable.name(), "auto-detect matched removable storage");
                let provider =
                    FaultTolerantStorageProvider::open(Arc::clone(removable), path, self.retry_budget);
                return ready_or_error(Box::new(provider), path);
            }
        }

        tracing::debug!(path = %path, "auto-detect found no backend with this path");
        Err(StreamError::NotFound(path.to_string()))
    }
}

fn require<'a>(
    backend: &'a Option<Arc<dyn StorageBackend>>,
    kind: &str,
) -> StreamResult<&'a Arc<dyn StorageBackend>> {
    backend
        .as_ref()
        .ok_or_else(|| StreamError::ProviderError(format!("no {kind} storage backend registered")))
}

fn ensure_exists(backend: &dyn StorageBackend, path: &str) -> StreamResult<()> {
    if backend.exists(path) {
        Ok(())
    } else {
        Err(StreamError::NotFound(path.to_string()))
    }
}

fn ready_or_error(provider: Box<dyn ContentProvider>, path: &str) -> StreamResult<Box<dyn ContentProvider>> {
    if provider.is_ready() {
        Ok(provider)
    } else {
        Err(StreamError::ProviderError(format!("could not open {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::{ScriptedStorage, read_to_end};

    fn factory() -> ProviderFactory {
        ProviderFactory::new()
            .with_flash(Arc::new(
                MemoryStorage::new("flash")
                    .with_file("/index.html", &b"<h1>flash</h1>"[..])
                    .with_file("/shared.txt", &b"from flash"[..]),
            ))
            .with_removable(Arc::new(
                MemoryStorage::new("sd")
                    .with_file("/video.mp4", &b"from sd"[..])
                    .with_file("/shared.txt", &b"from sd"[..]),
            ))
    }

    #[test]
    fn absent_everywhere_returns_none() {
        assert!(factory().create("/nowhere.bin", BackendHint::Auto).is_none());
        assert!(matches!(
            factory().try_create("/nowhere.bin", BackendHint::Auto),
            Err(StreamError::NotFound(_))
        ));
    }

    #[test]
    fn auto_prefers_flash() {
        let mut provider = factory().create("/shared.txt", BackendHint::Auto).unwrap();
        let (out, _) = read_to_end(provider.as_mut(), 64);
        assert_eq!(out, b"from flash");
    }

    #[test]
    fn auto_falls_back_to_removable() {
        let mut provider = factory().create("/video.mp4", BackendHint::Auto).unwrap();
        assert_eq!(provider.mime_type(), "video/mp4");
        let (out, _) = read_to_end(provider.as_mut(), 64);
        assert_eq!(out, b"from sd");
    }

    #[test]
    fn explicit_hint_selects_backend() {
        let factory = factory();

        let mut provider = factory.create("/shared.txt", BackendHint::Removable).unwrap();
        let (out, _) = read_to_end(provider.as_mut(), 64);
        assert_eq!(out, b"from sd");

        let mut provider = factory.create("/index.html", BackendHint::Unbuffered).unwrap();
        let (out, _) = read_to_end(provider.as_mut(), 4);
        assert_eq!(out, b"<h1>flash</h1>");

        assert!(factory.create("/video.mp4", BackendHint::Flash).is_none());
    }

    #[test]
    fn custom_backend() {
        let custom: Arc<dyn StorageBackend> =
            Arc::new(MemoryStorage::new("custom").with_file("/data.json", &b"{}"[..]));
        let provider = ProviderFactory::new()
            .create("/data.json", BackendHint::Custom(custom))
            .unwrap();
        assert_eq!(provider.mime_type(), "application/json");
        assert_eq!(provider.total_size(), 2);
    }

    #[test]
    fn missing_backend_is_provider_error() {
        let Err(err) = ProviderFactory::new().try_create("/a.txt", BackendHint::Removable) else {
            panic!("expected an error without a removable backend");
        };
        assert!(matches!(err, StreamError::ProviderError(_)));
    }

    #[test]
    fn unopenable_file_is_provider_error() {
        let storage = Arc::new(ScriptedStorage::new("/a.txt", &b"abc"[..]));
        storage.script.set_fail_open(true);
        let Err(err) = ProviderFactory::new()
            .with_flash(storage)
            .try_create("/a.txt", BackendHint::Auto)
        else {
            panic!("expected an error for an unopenable file");
        };
        assert!(matches!(err, StreamError::ProviderError(_)));
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(
            factory().try_create("", BackendHint::Auto),
            Err(StreamError::InvalidParameter(_))
        ));
    }

    #[test]
    fn from_settings_uses_local_roots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"local").unwrap();
        let settings = StorageSettings {
            flash_root: Some(dir.path().to_path_buf()),
            ..StorageSettings::default()
        };

        let mut provider = ProviderFactory::from_settings(&settings)
            .create("/notes.txt", BackendHint::Auto)
            .unwrap();
        let (out, _) = read_to_end(provider.as_mut(), 64);
        assert_eq!(out, b"local");
    }
}
