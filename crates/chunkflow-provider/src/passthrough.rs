//! Content-encoding wrapper point.
//!
//! [`PassThroughProvider`] tags a source with a content encoding and forwards
//! every call unchanged. No transformation is applied for any encoding; the
//! tag only travels with the provider.

use std::fmt;

use crate::ContentProvider;

/// Declared content encoding of a wrapped provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forwards to a ready source provider; not ready if the source is not.
pub struct PassThroughProvider {
    source: Box<dyn ContentProvider>,
    encoding: ContentEncoding,
    ready: bool,
}

impl PassThroughProvider {
    pub fn new<P: ContentProvider + 'static>(source: P, encoding: ContentEncoding) -> Self {
        let ready = source.is_ready();
        if ready && encoding != ContentEncoding::Identity {
            tracing::debug!(%encoding, "encoding wrapper is pass-through — content is not transformed");
        }
        Self {
            source: Box::new(source),
            encoding,
            ready,
        }
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }
}

impl ContentProvider for PassThroughProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if !self.ready {
            return 0;
        }
        self.source.read_chunk(buf, offset)
    }

    fn total_size(&self) -> u64 {
        if self.ready { self.source.total_size() } else { 0 }
    }

    fn mime_type(&self) -> &str {
        if self.ready { self.source.mime_type() } else { "" }
    }

    fn reset(&mut self) {
        if self.ready {
            self.source.reset();
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
