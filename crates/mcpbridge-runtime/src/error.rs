//! Error taxonomy for the editor-side bridge server and lifecycle
//! controller (spec §7). Framing corruption and normal disconnects are
//! handled inside the per-connection handler and never reach these types;
//! what's left is the set of conditions the accept loop, the lifecycle
//! controller, or a host integration actually needs to react to.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("port {0} is already in use")]
    AddressInUse(u16),

    #[error("failed to release port {0} before reload: {1}")]
    ReloadTeardownFailed(u16, String),

    #[error("reassembler detected a corrupt parse state on {0}: {1}")]
    ReassemblerInvariantViolated(SocketAddr, String),

    #[error("bridge server is not running")]
    NotRunning,

    #[error("port {0} did not become available within the wait budget")]
    PortWaitExhausted(u16),

    #[error("user declined the substitute port {0}")]
    PortSubstituteDeclined(u16),

    #[error("recovery on port {0} failed after {1} attempts: {2}")]
    RecoveryExhausted(u16, u32, String),

    #[error("session store error: {0}")]
    SessionStore(#[from] mcpbridge_core::error::SessionStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
