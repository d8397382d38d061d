//! Error codes for streaming configuration, registration, and provider setup.
//!
//! Read-time failures never surface here: once a transfer is running, every
//! failure collapses into a zero-byte chunk at the transport boundary. These
//! errors are returned synchronously from the calls that precede a transfer.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur before or while setting up a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("buffer size {size} exceeds maximum of {max} bytes")]
    BufferTooLarge { size: usize, max: usize },

    #[error("buffer size {size} is below minimum of {min} bytes")]
    BufferTooSmall { size: usize, min: usize },

    #[error("content provider error: {0}")]
    ProviderError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to allocate {0} bytes")]
    AllocationFailed(usize),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl StreamError {
    /// Short human-readable description of the error code, without details.
    pub fn description(&self) -> &'static str {
        match self {
            StreamError::InvalidParameter(_) => "Invalid parameter",
            StreamError::BufferTooLarge { .. } => "Buffer size too large",
            StreamError::BufferTooSmall { .. } => "Buffer size too small",
            StreamError::ProviderError(_) => "Content provider error",
            StreamError::NotFound(_) => "File not found",
            StreamError::AllocationFailed(_) => "Memory allocation failed",
            StreamError::TransportError(_) => "Transport error",
            StreamError::Timeout(_) => "Operation timeout",
            StreamError::Unknown(_) => "Unknown error",
        }
    }
}
