//! # mcpbridge-core
//!
//! Leaf dependency of the editor-embedded IPC bridge workspace: the
//! `Content-Length`-framed wire codec, the reusable buffer pool built on
//! top of it, the per-connection reassembler built on top of both, and the
//! shared wire types (session record, push notification, tool descriptor)
//! that the bridge server, lifecycle controller, and front end all trade
//! in. Nothing in this crate knows about sockets, accept loops, or MCP
//! session state — those live in `mcpbridge-runtime` and
//! `mcpbridge-frontend`.
//!
//! ## Quick start
//!
//! ```rust
//! use mcpbridge_core::framing::{self, HeaderParseResult};
//!
//! let frame = framing::encode(r#"{"jsonrpc":"2.0","method":"ping"}"#);
//! let HeaderParseResult::Complete { content_len, header_len } =
//!     framing::try_parse_header(&frame, frame.len()).unwrap()
//! else {
//!     panic!("expected a complete header");
//! };
//! let body = framing::extract_body(&frame, content_len, header_len).unwrap();
//! assert_eq!(body, r#"{"jsonrpc":"2.0","method":"ping"}"#);
//! ```

pub mod error;
pub mod framing;
pub mod pool;
pub mod push;
pub mod reassembler;
pub mod retry;
pub mod session;
pub mod tool;

pub use error::{FrameError, FrameResult, PoolError, PoolResult, SessionStoreError};
pub use pool::{BufferPool, PooledBuffer};
pub use push::{PushNotification, PushPayload, PushType};
pub use reassembler::Reassembler;
pub use retry::{retry_with_policy, with_timeout, RetryPolicy};
pub use session::{MemorySessionStore, SessionRecord, SessionStore, SledSessionStore};
pub use tool::{fingerprint, ToolDescriptor};
