//! Multi-part content provider.
//!
//! Concatenates an ordered list of providers into one logical byte stream.
//! Each part occupies a contiguous range of the composite offset space:
//!
//! ```text
//!   part 0          part 1     part 2
//! [0 ........ 10)[10 .. 15)[15 ....... 40)
//! ```
//!
//! A single `read_chunk` never crosses a part boundary, even if the
//! destination buffer has room for more. Callers advance the offset and call
//! again to continue into the next part.

use chunkflow_core::mime::DEFAULT_MIME_TYPE;
use chunkflow_core::{StreamError, StreamResult};

use crate::ContentProvider;

/// One sub-provider and its range within the composite.
struct Part {
    provider: Box<dyn ContentProvider>,
    start_offset: u64,
    size: u64,
}

impl Part {
    fn end_offset(&self) -> u64 {
        self.start_offset + self.size
    }
}

/// Ordered concatenation of ready providers.
pub struct MultiPartProvider {
    /// Parts in ascending, gap-free `start_offset` order. The sum of part
    /// sizes always fits in a `u64`.
    parts: Vec<Part>,
    total_size: u64,
    mime_type: String,
}

impl MultiPartProvider {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            parts: Vec::new(),
            total_size: 0,
            mime_type: mime_type.into(),
        }
    }

    /// Append a part. Returns `false` (and drops the provider) if it is not ready.
    pub fn add_part<P: ContentProvider + 'static>(&mut self, provider: P) -> bool {
        self.try_add_part(provider).is_ok()
    }

    /// Append a part, reporting why it was rejected.
    pub fn try_add_part<P: ContentProvider + 'static>(&mut self, provider: P) -> StreamResult<()> {
        if !provider.is_ready() {
            tracing::debug!(part = self.parts.len(), "rejected part — provider not ready");
            return Err(StreamError::ProviderError(
                "cannot add a provider that is not ready".to_string(),
            ));
        }

        let size = provider.total_size();
        let Some(end_offset) = self.total_size.checked_add(size) else {
            tracing::warn!(
                part = self.parts.len(),
                total_size = self.total_size,
                size,
                "rejected part — composite size would overflow"
            );
            return Err(StreamError::ProviderError(format!(
                "part of {size} bytes overflows composite size {}",
                self.total_size
            )));
        };
        tracing::debug!(
            part = self.parts.len(),
            start_offset = self.total_size,
            size,
            mime_type = provider.mime_type(),
            "added part"
        );
        self.parts.push(Part {
            provider: Box::new(provider),
            start_offset: self.total_size,
            size,
        });
        self.total_size = end_offset;
        Ok(())
    }

    /// Builder method: append a part, ignoring rejection.
    pub fn with_part<P: ContentProvider + 'static>(mut self, provider: P) -> Self {
        self.add_part(provider);
        self
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// `(start_offset, size)` of every part, in order.
    pub fn part_ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.parts.iter().map(|p| (p.start_offset, p.size))
    }

    /// Index of the part whose range contains `offset`.
    ///
    /// Part ends are non-decreasing, so the first part ending past `offset`
    /// is the owner. Zero-sized parts are never selected.
    fn locate(&self, offset: u64) -> Option<usize> {
        let index = self.parts.partition_point(|p| p.end_offset() <= offset);
        let part = self.parts.get(index)?;
        (part.start_offset <= offset).then_some(index)
    }
}

impl Default for MultiPartProvider {
    fn default() -> Self {
        Self::new(DEFAULT_MIME_TYPE)
    }
}

impl ContentProvider for MultiPartProvider {
    fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> usize {
        if buf.is_empty() || offset >= self.total_size {
            return 0;
        }
        let Some(index) = self.locate(offset) else {
            return 0;
        };

        let part = &mut self.parts[index];
        let local_offset = offset - part.start_offset;
        let part_remaining = part.size - local_offset;
        let len = usize::try_from(part_remaining).map_or(buf.len(), |r| r.min(buf.len()));

        let n = part.provider.read_chunk(&mut buf[..len], local_offset);
        if n == 0 {
            tracing::debug!(part = index, offset, local_offset, "part returned no data");
        }
        n
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn reset(&mut self) {
        for part in &mut self.parts {
            part.provider.reset();
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pattern, read_to_end};
    use crate::{GeneratorProvider, MemoryProvider};

    fn a_and_b() -> MultiPartProvider {
        let mut provider = MultiPartProvider::default();
        assert!(provider.add_part(MemoryProvider::from_static(b"AAAAAAAAAA", "text/plain")));
        assert!(provider.add_part(MemoryProvider::from_static(b"BBBBB", "text/plain")));
        provider
    }

    #[test]
    fn parts_are_contiguous() {
        let provider = a_and_b();
        let ranges: Vec<_> = provider.part_ranges().collect();
        assert_eq!(ranges, vec![(0, 10), (10, 5)]);
        assert_eq!(provider.total_size(), 15);
    }

    #[test]
    fn chunk_never_spans_parts() {
        let mut provider = a_and_b();
        let mut buf = [0u8; 10];

        let n = provider.read_chunk(&mut buf, 8);
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"AA");

        let n = provider.read_chunk(&mut buf, 10);
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], b"BBBBB");
    }

    #[test]
    fn sequential_reads_concatenate_parts() {
        let first = pattern(3000);
        let mut provider = MultiPartProvider::new("application/octet-stream")
            .with_part(MemoryProvider::from_vec(first.clone(), "application/octet-stream"))
            .with_part(GeneratorProvider::new(
                |buf: &mut [u8], _| {
                    buf.fill(b'g');
                    buf.len()
                },
                700,
                "application/octet-stream",
            ))
            .with_part(MemoryProvider::from_static(b"tail", "text/plain"));

        let (out, sizes) = read_to_end(&mut provider, 1024);
        assert_eq!(out.len() as u64, provider.total_size());
        assert_eq!(out.len(), 3704);
        assert_eq!(&out[..3000], &first[..]);
        assert!(out[3000..3700].iter().all(|&b| b == b'g'));
        assert_eq!(&out[3700..], b"tail");
        // 1024, 1024, 952 (end of part 0), 700, 4
        assert_eq!(sizes, vec![1024, 1024, 952, 700, 4]);
    }

    #[test]
    fn not_ready_part_is_rejected() {
        let mut provider = MultiPartProvider::default();
        let err = provider
            .try_add_part(MemoryProvider::from_vec(Vec::new(), "text/plain"))
            .unwrap_err();
        assert!(matches!(err, StreamError::ProviderError(_)));
        assert_eq!(provider.part_count(), 0);
        assert_eq!(provider.total_size(), 0);
    }

    #[test]
    fn oversized_part_is_rejected() {
        let mut provider = MultiPartProvider::default();
        assert!(provider.add_part(GeneratorProvider::new(|buf: &mut [u8], _| buf.len(), u64::MAX, "text/plain")));

        let err = provider
            .try_add_part(GeneratorProvider::new(|buf: &mut [u8], _| buf.len(), 10, "text/plain"))
            .unwrap_err();
        assert!(matches!(err, StreamError::ProviderError(_)));
        assert_eq!(provider.part_count(), 1);
        assert_eq!(provider.total_size(), u64::MAX);

        // Reads near the end still resolve to the first part.
        let mut buf = [0u8; 4];
        assert_eq!(provider.read_chunk(&mut buf, u64::MAX - 2), 2);
    }

    #[test]
    fn zero_sized_parts_are_skipped() {
        let mut provider = MultiPartProvider::default();
        provider.add_part(MemoryProvider::from_static(b"ab", "text/plain"));
        provider.add_part(GeneratorProvider::new(|_buf: &mut [u8], _| 0, 0, "text/plain"));
        provider.add_part(MemoryProvider::from_static(b"cd", "text/plain"));

        let mut buf = [0u8; 4];
        assert_eq!(provider.read_chunk(&mut buf, 2), 2);
        assert_eq!(&buf[..2], b"cd");

        let (out, _) = read_to_end(&mut provider, 4);
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn reads_past_end_return_zero() {
        let mut provider = a_and_b();
        assert_eq!(provider.read_chunk(&mut [0u8; 4], 15), 0);
        assert_eq!(MultiPartProvider::default().read_chunk(&mut [0u8; 4], 0), 0);
    }

    #[test]
    fn reset_reaches_every_part() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingReset(Arc<AtomicUsize>);

        impl ContentProvider for CountingReset {
            fn read_chunk(&mut self, _buf: &mut [u8], _offset: u64) -> usize {
                0
            }
            fn total_size(&self) -> u64 {
                1
            }
            fn mime_type(&self) -> &str {
                "text/plain"
            }
            fn reset(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn is_ready(&self) -> bool {
                true
            }
        }

        let resets = Arc::new(AtomicUsize::new(0));
        let mut provider = MultiPartProvider::default()
            .with_part(CountingReset(Arc::clone(&resets)))
            .with_part(CountingReset(Arc::clone(&resets)));

        provider.reset();
        assert_eq!(resets.load(Ordering::SeqCst), 2);
        assert_eq!(provider.total_size(), 2);
    }
}
