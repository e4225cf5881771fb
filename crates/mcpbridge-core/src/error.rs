use thiserror::Error;

/// Errors produced by the framing codec and the reassembler built on top of
/// it. Every variant here is, per spec, fatal to the *connection* it was
/// raised on, never to the process — callers close the one offending
/// socket and keep the server running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Content-Length header malformed: {0}")]
    HeaderMalformed(String),

    #[error("declared content length {0} exceeds MAX_MESSAGE ({1})")]
    ContentLengthTooLarge(usize, usize),

    #[error("parsed length is negative or otherwise invalid")]
    NegativeLength,

    #[error("buffer underflow while slicing a frame")]
    BufferUnderflow,

    #[error("frame body is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors from the buffer pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("requested size {0} is outside the allowed range (0, {1}]")]
    SizeOutOfRange(usize, usize),
}

/// Errors from the session record store.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session store backend error: {0}")]
    Backend(String),
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;
pub type PoolResult<T> = std::result::Result<T, PoolError>;
pub type SessionResult<T> = std::result::Result<T, SessionStoreError>;
