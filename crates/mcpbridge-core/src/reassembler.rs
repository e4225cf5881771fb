//! Turns a stream of arbitrary-sized byte chunks into a sequence of
//! complete JSON frames. Single-owner, never shared across tasks, never
//! blocks — it only yields the frames it already has in hand.

use crate::error::{FrameError, FrameResult};
use crate::framing::{self, HeaderParseResult};
use crate::pool::{BufferPool, PooledBuffer};
use mcpbridge_config::constants::MAX_MESSAGE;
use std::sync::Arc;

struct ParseState {
    header_len: usize,
    content_len: usize,
}

/// Per-connection incremental frame parser.
pub struct Reassembler {
    pool: Arc<BufferPool>,
    buf: Option<PooledBuffer>,
    parsed: Option<ParseState>,
}

impl Reassembler {
    pub fn new(pool: Arc<BufferPool>) -> FrameResult<Self> {
        let buf = pool
            .acquire(mcpbridge_config::constants::INITIAL_BUF)
            .map_err(|_| FrameError::BufferUnderflow)?;
        Ok(Self {
            pool,
            buf: Some(buf),
            parsed: None,
        })
    }

    fn buf(&self) -> &PooledBuffer {
        self.buf.as_ref().expect("reassembler buffer taken")
    }

    fn buf_mut(&mut self) -> &mut PooledBuffer {
        self.buf.as_mut().expect("reassembler buffer taken")
    }

    /// Append `chunk` to the internal buffer, growing it first if needed.
    pub fn append(&mut self, chunk: &[u8]) -> FrameResult<()> {
        let current_len = self.buf().len();
        let needed = current_len + chunk.len();
        if needed > self.buf().capacity() {
            let pool = self.pool.clone();
            pool.grow(self.buf_mut(), current_len, needed)
                .map_err(|_| FrameError::ContentLengthTooLarge(needed, MAX_MESSAGE))?;
        }
        self.buf_mut().as_mut_vec().extend_from_slice(chunk);
        Ok(())
    }

    /// Repeatedly extract complete frames from the front of the buffer
    /// until either it's empty or the front is an incomplete frame.
    pub fn extract(&mut self) -> FrameResult<Vec<String>> {
        let mut frames = Vec::new();
        loop {
            if self.buf().is_empty() {
                break;
            }

            let state = match &self.parsed {
                Some(state) => ParseState {
                    header_len: state.header_len,
                    content_len: state.content_len,
                },
                None => match framing::try_parse_header(self.buf().as_slice(), self.buf().len())?
                {
                    HeaderParseResult::NeedMore => break,
                    HeaderParseResult::Complete {
                        content_len,
                        header_len,
                    } => {
                        self.validate_lengths(header_len, content_len)?;
                        ParseState {
                            header_len,
                            content_len,
                        }
                    }
                },
            };

            if !framing::is_complete(self.buf().len(), state.content_len, state.header_len) {
                self.parsed = Some(state);
                break;
            }

            let body = framing::extract_body(
                self.buf().as_slice(),
                state.content_len,
                state.header_len,
            )?;
            let total = state.header_len + state.content_len;
            self.shift_front(total)?;
            self.parsed = None;
            frames.push(body);
        }
        Ok(frames)
    }

    fn validate_lengths(&self, header_len: usize, content_len: usize) -> FrameResult<()> {
        let total = header_len
            .checked_add(content_len)
            .ok_or(FrameError::BufferUnderflow)?;
        if total > MAX_MESSAGE {
            return Err(FrameError::ContentLengthTooLarge(total, MAX_MESSAGE));
        }
        Ok(())
    }

    fn shift_front(&mut self, n: usize) -> FrameResult<()> {
        if n > self.buf().len() {
            return Err(FrameError::BufferUnderflow);
        }
        self.buf_mut().as_mut_vec().drain(0..n);
        Ok(())
    }

    /// Capacity of the staging buffer, for sizing the next socket read.
    pub fn read_capacity(&self) -> usize {
        self.buf()
            .capacity()
            .saturating_sub(self.buf().len())
            .max(1)
    }
}

impl Drop for Reassembler {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
