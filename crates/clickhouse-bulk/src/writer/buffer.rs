//! Pooled output regions.
//!
//! A [`BufferPool`] hands out [`PooledBuffer`]s and takes them back when
//! they are dropped, so a steady stream of copy operations reuses the same
//! allocations.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Regions kept per pool.
const MAX_POOLED: usize = 64;

/// Regions that grew past this capacity are freed instead of pooled.
const MAX_POOLED_CAPACITY: usize = 1024 * 1024;

static GLOBAL: OnceLock<BufferPool> = OnceLock::new();

/// Pool of reusable byte regions.
#[derive(Clone, Default)]
pub struct BufferPool {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide pool, created on first use.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Rent an empty region with at least `capacity` bytes of room.
    pub fn acquire(&self, capacity: usize) -> PooledBuffer {
        let mut buf = self.inner.lock().pop().unwrap_or_default();
        buf.clear();
        buf.reserve(capacity);
        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Regions waiting to be reused.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.lock().len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .finish()
    }
}

/// Region rented from a [`BufferPool`]; returned when dropped.
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PooledBuffer {
    /// Bytes that fit before the region has to grow.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.capacity() - self.buf.len()
    }

    /// Grow the region so at least `additional` more bytes fit.
    pub fn grow(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        if buf.capacity() == 0 || buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        let mut pool = self.pool.lock();
        if pool.len() < MAX_POOLED {
            pool.push(buf);
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_to_pool() {
        let pool = BufferPool::new();
        assert_eq!(pool.available(), 0);
        {
            let mut buf = pool.acquire(128);
            assert!(buf.remaining() >= 128);
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire(16);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 128);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_oversized_buffer_is_freed() {
        let pool = BufferPool::new();
        drop(pool.acquire(MAX_POOLED_CAPACITY + 1));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_grow() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire(8);
        buf.extend_from_slice(&[0; 8]);
        buf.grow(100);
        assert!(buf.remaining() >= 100);
    }
}
