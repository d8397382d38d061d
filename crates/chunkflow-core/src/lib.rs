pub mod config;
pub mod error;
pub mod mime;

pub use config::{ChunkflowConfig, StorageSettings, StreamingSettings};
pub use error::{StreamError, StreamResult};

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
