//! Bounded pool of reusable media buffers.
//!
//! The pool is the throttle between the reader and writer tasks: the
//! reader can only run as far ahead as there are free buffers. Checkout
//! waits on a semaphore with a deadline; a timeout is not an error, the
//! caller just polls again.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{Result, StrandError};

// ── MediaBuffer ──────────────────────────────────────────────────

/// One chunk of media. The reader fills it; the writer stamps
/// `sequence` and `timestamp` just before sending.
#[derive(Debug, Clone, Default)]
pub struct MediaBuffer {
    pub sequence: u16,
    pub payload_type: u8,
    pub ssrc: u32,
    pub timestamp: u32,
    /// Samples in this chunk.
    pub samples: u32,
    pub duration_ms: u32,
    pub end_of_stream: bool,
    data: Box<[u8]>,
    len: usize,
}

impl MediaBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The filled part of the buffer.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The whole backing storage, for a source to fill.
    pub fn fill_slot(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.data.len() {
            return Err(StrandError::Other(format!(
                "payload length {len} exceeds buffer capacity {}",
                self.data.len()
            )));
        }
        self.len = len;
        Ok(())
    }

    /// Reset every stamped field; the storage is kept.
    pub fn clear(&mut self) {
        let data = std::mem::take(&mut self.data);
        *self = Self {
            data,
            ..Self::default()
        };
    }
}

// ── MediaBufferPool ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub free: usize,
    pub checked_out: usize,
}

#[derive(Debug)]
struct PoolState {
    free: Vec<MediaBuffer>,
    checked_out: usize,
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    permits: Semaphore,
    capacity: usize,
    payload_size: usize,
}

/// Fixed-size set of buffers shared by the reader and writer tasks.
///
/// Cloning yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct MediaBufferPool {
    inner: Arc<PoolInner>,
}

impl MediaBufferPool {
    /// Pre-allocate `capacity` buffers of `payload_size` bytes.
    pub fn new(capacity: usize, payload_size: usize) -> Self {
        let free = (0..capacity).map(|_| MediaBuffer::new(payload_size)).collect();
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    free,
                    checked_out: 0,
                }),
                permits: Semaphore::new(capacity),
                capacity,
                payload_size,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn payload_size(&self) -> usize {
        self.inner.payload_size
    }

    /// Wait up to `timeout` for a free buffer.
    ///
    /// Returns `None` on timeout or once the pool is closed.
    pub async fn checkout(&self, timeout: Duration) -> Option<PooledBuffer> {
        match tokio::time::timeout(timeout, self.inner.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                self.take_free()
            }
            Ok(Err(_closed)) => None,
            Err(_elapsed) => None,
        }
    }

    /// Take a free buffer without waiting.
    pub fn try_checkout(&self) -> Option<PooledBuffer> {
        let permit = self.inner.permits.try_acquire().ok()?;
        permit.forget();
        self.take_free()
    }

    fn take_free(&self) -> Option<PooledBuffer> {
        let mut state = self.inner.state.lock();
        match state.free.pop() {
            Some(buffer) => {
                state.checked_out += 1;
                Some(PooledBuffer {
                    buffer,
                    pool: Some(self.clone()),
                })
            }
            None => {
                // Permits and the free list disagree; hand the permit back.
                drop(state);
                self.inner.permits.add_permits(1);
                None
            }
        }
    }

    /// Return a buffer obtained through [`PooledBuffer::into_inner`].
    pub fn release_buffer(&self, mut buffer: MediaBuffer) {
        let mut state = self.inner.state.lock();
        if state.checked_out == 0 {
            warn!("buffer released to a pool with nothing checked out; dropping it");
            return;
        }
        buffer.clear();
        state.checked_out -= 1;
        state.free.push(buffer);
        drop(state);
        self.inner.permits.add_permits(1);
    }

    /// Wake every waiting checkout and refuse new ones. Buffers still
    /// checked out can be released afterwards.
    pub fn close(&self) {
        self.inner.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            capacity: self.inner.capacity,
            free: state.free.len(),
            checked_out: state.checked_out,
        }
    }
}

// ── PooledBuffer ─────────────────────────────────────────────────

/// Exclusive handle on a checked-out buffer. Dropping it returns the
/// buffer to its pool.
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: MediaBuffer,
    pool: Option<MediaBufferPool>,
}

impl PooledBuffer {
    /// Return the buffer to the pool now.
    pub fn release(self) {
        drop(self);
    }

    /// Detach the buffer from the guard. The caller must hand it back
    /// with [`MediaBufferPool::release_buffer`].
    pub fn into_inner(mut self) -> MediaBuffer {
        self.pool = None;
        std::mem::take(&mut self.buffer)
    }
}

impl Deref for PooledBuffer {
    type Target = MediaBuffer;

    fn deref(&self) -> &MediaBuffer {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut MediaBuffer {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release_buffer(std::mem::take(&mut self.buffer));
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
