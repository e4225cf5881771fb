//! Error taxonomy for the front-end's editor-client half (spec §4.6,
//! §4.7). The MCP-facing half of the front end answers to its SDK
//! transport's own error type; this crate's `FrontendError` only covers
//! the editor-discovery/tool-manager/push-channel surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("UNITY_TCP_PORT is not set; editor discovery is disabled")]
    EditorPortNotConfigured,

    #[error("UNITY_TCP_PORT={0} is out of range (must be 1..=65535)")]
    EditorPortOutOfRange(u32),

    #[error("editor is not currently connected")]
    NotConnected,

    #[error("timed out waiting for the editor connection")]
    ConnectTimeout,

    #[error("editor connection closed while awaiting a response")]
    ConnectionClosed,

    #[error("malformed tool catalog response: {0}")]
    MalformedToolCatalog(String),

    #[error("JSON-RPC error response: {0}")]
    RpcError(String),

    #[error("push receive server failed to bind: {0}")]
    PushServerBindFailed(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("framing error: {0}")]
    Framing(#[from] mcpbridge_core::error::FrameError),
}

pub type Result<T> = std::result::Result<T, FrontendError>;
