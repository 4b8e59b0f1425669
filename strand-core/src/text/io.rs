//! Byte-oriented channels underneath the text streams.
//!
//! [`TextReader`](super::TextReader) pulls raw bytes from a [`ByteSource`]
//! and [`TextWriter`](super::TextWriter) pushes encoded bytes into a
//! [`ByteSink`]. Adapters are provided for in-memory buffers and for any
//! `std::io` reader or writer.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, StrandError};

// ── Traits ───────────────────────────────────────────────────────

/// A channel raw bytes can be read from.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. Returns 0 at end of input.
    fn read_raw_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Rewind to the start of the data.
    fn reset(&mut self) -> Result<()>;
}

/// A channel encoded bytes are written to.
pub trait ByteSink {
    /// Write every byte of `buf`.
    fn write_raw_bytes(&mut self, buf: &[u8]) -> Result<()>;

    /// Push buffered bytes to the final destination.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Discard everything written and start over.
    fn reset(&mut self) -> Result<()>;
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read_raw_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_raw_bytes(buf)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn write_raw_bytes(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_raw_bytes(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }
}

// ── MemorySource ─────────────────────────────────────────────────

/// Reads from an owned byte buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for MemorySource {
    fn read_raw_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn reset(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}

// ── ReadSource ───────────────────────────────────────────────────

/// Wraps any seekable `std::io` reader.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read + Seek> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> ByteSource for ReadSource<R> {
    fn read_raw_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

// ── MemorySink ───────────────────────────────────────────────────

/// Collects written bytes in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSink for MemorySink {
    fn write_raw_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.data.clear();
        Ok(())
    }
}

// ── WriteSink ────────────────────────────────────────────────────

/// Wraps any `std::io` writer. Resetting is not supported.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn write_raw_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        Err(StrandError::Other("write sink cannot be reset".into()))
    }
}

// ── Tests ────────────────────────────────────────────────────────
