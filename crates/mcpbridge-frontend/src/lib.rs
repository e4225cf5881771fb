//! # mcpbridge-frontend
//!
//! The MCP-facing half of the editor-embedded IPC bridge (spec §2, §4.6,
//! §4.7): editor discovery over `UNITY_TCP_PORT`, a JSON-RPC client
//! ([`editor_client::EditorClient`]) that speaks the same framed wire as
//! [`mcpbridge_runtime::BridgeServer`], a tool-catalog mirror with
//! change-detected `tools/list_changed` announcements, MCP client
//! keepalive, stuck-connection recovery, the inbound push-notification
//! receiver, and the `initialize` handshake that ties all of it together
//! per client-compatibility class.
//!
//! `mcp_transport` selects the `pmcp` transport the MCP client side rides
//! on; everything else in this crate is transport-agnostic and only
//! trades in already-decoded `serde_json::Value`s.

pub mod discovery;
pub mod editor_client;
pub mod error;
pub mod init_state;
pub mod keepalive;
pub mod mcp_transport;
pub mod push_receive;
pub mod recovery;
pub mod session;
pub mod signals;
pub mod tool_manager;

pub use discovery::{editor_port_from_env, DiscoveryEvent, EditorDiscovery};
pub use editor_client::EditorClient;
pub use error::{FrontendError, Result};
pub use init_state::{InitAction, InitGuard, InitializeResult, SharedInitGuard};
pub use keepalive::{Keepalive, PingSender};
pub use mcp_transport::{create_transport, McpTransportKind};
pub use push_receive::{DisconnectReason, PushEvent, PushReceiveServer, SharedPushReceiveServer};
pub use recovery::StuckDetector;
pub use session::{classify_client, ClientClass, FrontendSession, McpNotifier, PendingRequests};
pub use signals::{install_panic_shutdown_hook, spawn_shutdown_watch, ShutdownCoordinator};
pub use tool_manager::{SharedToolManager, ToolManager};
