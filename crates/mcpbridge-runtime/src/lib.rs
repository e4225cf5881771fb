//! # mcpbridge-runtime
//!
//! Editor-side half of the IPC bridge: a loopback TCP server that speaks
//! length-prefixed JSON-RPC to long-lived MCP clients, and the lifecycle
//! controller that keeps it alive across the host editor's domain reloads.
//!
//! This crate is deliberately opaque to tool/resource/prompt semantics —
//! that belongs to whatever implements [`RequestProcessor`] and hands it to
//! a [`BridgeServer`]. What lives here is the framing-aware connection
//! handling, the reload-survival protocol, and the narrow callback traits
//! that decouple the two from their host.
//!
//! ## Quick start
//!
//! ```no_run
//! use mcpbridge_runtime::{BridgeServer, RequestProcessor};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl RequestProcessor for Echo {
//!     async fn process(&self, _endpoint: SocketAddr, request: &str) -> Option<String> {
//!         Some(request.to_string())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> mcpbridge_runtime::Result<()> {
//! let server = Arc::new(BridgeServer::new(Arc::new(Echo), None, None));
//! server.start(0).await?;
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod disconnect;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod traits;

pub use connection::{Connection, ConnectionTable};
pub use disconnect::is_normal_disconnect;
pub use error::{Result, RuntimeError};
pub use lifecycle::LifecycleController;
pub use server::BridgeServer;
pub use traits::{ConnectionSink, ErrorSink, ReloadScheduler, RequestProcessor, UserConfirmation};
