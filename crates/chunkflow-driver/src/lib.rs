//! Streaming driver.
//!
//! [`StreamingDriver`] validates buffer sizes, takes ownership of a
//! [`ContentProvider`](chunkflow_provider::ContentProvider) for one transfer,
//! and registers a chunk producer with a [`Transport`]. The transport pulls
//! chunks; the driver counts bytes, reports progress, and releases the
//! provider when the transfer ends.

pub mod context;
pub mod driver;
pub mod loopback;
pub mod transport;

pub use context::{ProgressCallback, StreamingContext, TransferHandle, TransferOutcome};
pub use driver::{StreamingDriver, TransferOptions};
pub use loopback::{FetchSummary, LoopbackTransport};
pub use transport::{ChunkProducer, Method, Transport};
