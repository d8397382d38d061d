//! The seam between the streaming driver and an HTTP-style transport.
//!
//! The transport owns connections and framing. The driver only hands it a
//! [`ChunkProducer`] per route; the transport calls the producer with a
//! buffer and the offset of the next chunk until it returns `0`.

use std::fmt;

/// Pull callback registered with a transport.
///
/// Called with the destination buffer (its length is the most the
/// transport will accept) and the absolute offset of the next chunk.
/// Returns the number of bytes written; `0` ends the response.
///
/// Dropping the producer releases the transfer it belongs to, so a
/// transport that aborts a response only has to drop it.
pub type ChunkProducer = Box<dyn FnMut(&mut [u8], u64) -> usize + Send>;

/// Request method a route responds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    /// Match any method.
    Any,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Any => "ANY",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chunked-response transport.
///
/// Implementations decide how and when the producer is pulled. Errors are
/// plain strings; the driver wraps them in a transport error.
pub trait Transport {
    /// Whether the transport can accept registrations.
    fn is_available(&self) -> bool;

    /// Register a chunked response for `route`.
    ///
    /// `content_length` is the declared total size of the response.
    fn register(
        &mut self,
        route: &str,
        method: Method,
        producer: ChunkProducer,
        mime_type: &str,
        content_length: u64,
    ) -> Result<(), String>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn register(
        &mut self,
        route: &str,
        method: Method,
        producer: ChunkProducer,
        mime_type: &str,
        content_length: u64,
    ) -> Result<(), String> {
        (**self).register(route, method, producer, mime_type, content_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Any.as_str(), "ANY");
        assert_eq!(Method::default(), Method::Get);
    }
}
