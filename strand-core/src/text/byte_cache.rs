//! Fixed-size raw byte staging buffer.
//!
//! Holds bytes read from a [`ByteSource`] until the transcoder has
//! consumed them. Whatever the transcoder could not use yet (a multi-byte
//! sequence cut off by the end of a read) stays at the front of the
//! cache and is converted together with the next read.

use crate::error::Result;
use crate::text::io::ByteSource;

/// Fixed-capacity byte buffer with a consumed-prefix cursor.
///
/// Invariant: `start <= end <= capacity`.
#[derive(Debug, Clone)]
pub struct ByteCache {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl ByteCache {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "byte cache capacity must be non-zero");
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Room left for new bytes after compaction.
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// The unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Mark `n` leading bytes as consumed.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consumed past end of byte cache");
        self.start += n;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Append bytes, returning how many fit.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        self.compact();
        let n = bytes.len().min(self.capacity() - self.end);
        self.buf[self.end..self.end + n].copy_from_slice(&bytes[..n]);
        self.end += n;
        n
    }

    /// Top the cache up from `source`. Returns the bytes read; 0 means the
    /// source is exhausted (or the cache is already full).
    pub fn fill_from<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<usize> {
        self.compact();
        if self.end == self.capacity() {
            return Ok(0);
        }
        let n = source.read_raw_bytes(&mut self.buf[self.end..])?;
        self.end += n;
        Ok(n)
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Move the unconsumed tail to the front.
    fn compact(&mut self) {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
