//! chunkflow.toml configuration parser and buffer-size limits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Default streaming chunk size (4 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Largest accepted streaming chunk size (8 KB).
pub const MAX_BUFFER_SIZE: usize = 8192;
/// Smallest accepted streaming chunk size (512 B).
pub const MIN_BUFFER_SIZE: usize = 512;
/// Default transfer timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default read-ahead window for buffered storage providers.
pub const DEFAULT_CACHE_SIZE: usize = 4096;
/// Default number of reopen attempts for fault-tolerant storage providers.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Check a buffer size against `[MIN_BUFFER_SIZE, MAX_BUFFER_SIZE]`.
///
/// Both bounds are inclusive. Out-of-range values are rejected, never clamped.
pub fn validate_buffer_size(size: usize) -> StreamResult<usize> {
    if size < MIN_BUFFER_SIZE {
        return Err(StreamError::BufferTooSmall {
            size,
            min: MIN_BUFFER_SIZE,
        });
    }
    if size > MAX_BUFFER_SIZE {
        return Err(StreamError::BufferTooLarge {
            size,
            max: MAX_BUFFER_SIZE,
        });
    }
    Ok(size)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkflowConfig {
    pub streaming: Option<StreamingConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub buffer_size: Option<usize>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    pub flash_root: Option<PathBuf>,
    pub removable_root: Option<PathBuf>,
    pub cache_size: Option<usize>,
    pub retry_budget: Option<u32>,
}

/// Validated streaming settings, ready to hand to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingSettings {
    pub buffer_size: usize,
    pub timeout: Duration,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolved storage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub flash_root: Option<PathBuf>,
    pub removable_root: Option<PathBuf>,
    pub cache_size: usize,
    pub retry_budget: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            flash_root: None,
            removable_root: None,
            cache_size: DEFAULT_CACHE_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl ChunkflowConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ChunkflowConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a chunkflow.toml with every setting at its default.
    pub fn scaffold(flash_root: &str) -> Self {
        ChunkflowConfig {
            streaming: Some(StreamingConfig {
                buffer_size: Some(DEFAULT_BUFFER_SIZE),
                timeout: Some("30s".to_string()),
            }),
            storage: Some(StorageConfig {
                flash_root: Some(PathBuf::from(flash_root)),
                removable_root: None,
                cache_size: Some(DEFAULT_CACHE_SIZE),
                retry_budget: Some(DEFAULT_RETRY_BUDGET),
            }),
        }
    }

    /// Resolve the `[streaming]` table, validating the buffer size.
    pub fn streaming_settings(&self) -> StreamResult<StreamingSettings> {
        let Some(streaming) = &self.streaming else {
            return Ok(StreamingSettings::default());
        };

        let buffer_size = match streaming.buffer_size {
            Some(size) => validate_buffer_size(size)?,
            None => DEFAULT_BUFFER_SIZE,
        };

        let timeout = match &streaming.timeout {
            Some(raw) => parse_duration(raw).ok_or_else(|| {
                StreamError::InvalidParameter(format!("unparseable timeout: {raw:?}"))
            })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(StreamingSettings {
            buffer_size,
            timeout,
        })
    }

    /// Resolve the `[storage]` table.
    pub fn storage_settings(&self) -> StreamResult<StorageSettings> {
        let Some(storage) = &self.storage else {
            return Ok(StorageSettings::default());
        };

        let cache_size = storage.cache_size.unwrap_or(DEFAULT_CACHE_SIZE);
        if cache_size == 0 {
            return Err(StreamError::InvalidParameter(
                "cache_size must be > 0".to_string(),
            ));
        }

        Ok(StorageSettings {
            flash_root: storage.flash_root.clone(),
            removable_root: storage.removable_root.clone(),
            cache_size,
            retry_budget: storage.retry_budget.unwrap_or(DEFAULT_RETRY_BUDGET),
        })
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
///
/// Values that do not fit in a `Duration` are rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
