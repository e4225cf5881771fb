//! Reusable byte buffers for reassembler staging and outbound frames.
//!
//! `PooledBuffer` is an owning handle (not a borrowed slice) so `grow` can
//! replace it in place while making the hand-off of the old buffer back to
//! the pool explicit, per the design note in spec §9 about `ref`-parameter
//! buffer growth.

use crate::error::{PoolError, PoolResult};
use mcpbridge_config::constants::{INITIAL_BUF, MAX_BUF, MAX_POOL, MIN_BUF};
use std::sync::Mutex;

/// An owned, reusable byte buffer borrowed from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer {
    data: Vec<u8>,
}

impl PooledBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

/// Amortizes allocation of working buffers for reads and writes. Safe for
/// concurrent `acquire`/`release`; the soft cap on occupants is advisory
/// and may be briefly exceeded under contention.
pub struct BufferPool {
    free: Mutex<Vec<PooledBuffer>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a buffer with capacity at least `min_size`. Reuses a pooled
    /// buffer of sufficient capacity if one is free, otherwise allocates a
    /// fresh one starting at [`INITIAL_BUF`] and doubling up to the
    /// requirement (clamped to [`MAX_BUF`]).
    pub fn acquire(&self, min_size: usize) -> PoolResult<PooledBuffer> {
        if min_size == 0 || min_size > MAX_BUF {
            return Err(PoolError::SizeOutOfRange(min_size, MAX_BUF));
        }

        {
            let mut free = self.free.lock().expect("buffer pool mutex poisoned");
            if let Some(pos) = free.iter().position(|b| b.capacity() >= min_size) {
                let mut buf = free.swap_remove(pos);
                buf.data.clear();
                return Ok(buf);
            }
        }

        Ok(PooledBuffer::with_capacity(sized_capacity(min_size)))
    }

    /// Return a buffer to the pool. Silently discarded if its capacity
    /// falls outside `[MIN_BUF, MAX_BUF]` or the pool is already at its
    /// soft cap.
    pub fn release(&self, mut buffer: PooledBuffer) {
        if buffer.capacity() < MIN_BUF || buffer.capacity() > MAX_BUF {
            return;
        }
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        if free.len() >= MAX_POOL {
            return;
        }
        buffer.data.clear();
        free.push(buffer);
    }

    /// Replace `*handle` with a buffer of capacity at least `new_min_size`,
    /// preserving the first `valid_prefix_len` bytes. The old buffer is
    /// released back to the pool.
    pub fn grow(
        &self,
        handle: &mut PooledBuffer,
        valid_prefix_len: usize,
        new_min_size: usize,
    ) -> PoolResult<()> {
        if new_min_size > MAX_BUF {
            return Err(PoolError::SizeOutOfRange(new_min_size, MAX_BUF));
        }
        if handle.capacity() >= new_min_size {
            return Ok(());
        }

        let mut replacement = self.acquire(new_min_size)?;
        replacement
            .as_mut_vec()
            .extend_from_slice(&handle.as_slice()[..valid_prefix_len.min(handle.len())]);

        let old = std::mem::replace(handle, replacement);
        self.release(old);
        Ok(())
    }

    /// Number of buffers currently idle in the pool (for tests/metrics).
    pub fn occupancy(&self) -> usize {
        self.free.lock().expect("buffer pool mutex poisoned").len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

fn sized_capacity(min_size: usize) -> usize {
    let mut cap = INITIAL_BUF;
    while cap < min_size {
        cap = (cap * 2).min(MAX_BUF);
        if cap == MAX_BUF {
            break;
        }
    }
    cap.max(min_size).min(MAX_BUF)
}
