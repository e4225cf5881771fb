//! Narrow-interface callbacks the bridge server and lifecycle controller
//! are constructed with, replacing the cyclic back-pointers between the
//! server and its observers that spec §9 flags as a re-architecture the
//! source patterns require.

use crate::error::RuntimeError;
use async_trait::async_trait;
use std::net::SocketAddr;

/// Hands a decoded JSON-RPC request body to whatever owns the tool
/// catalog and can evaluate it. Returns the response body to write back,
/// or `None` for a notification that produces no response. The bridge is
/// opaque to payload semantics (spec §1): it never inspects `request` or
/// the returned text beyond framing them.
#[async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(&self, endpoint: SocketAddr, request: &str) -> Option<String>;
}

/// Surfaces server-level failures (spec §7): listener bind errors, accept
/// errors that aren't a clean shutdown, reassembler invariant violations.
pub trait ErrorSink: Send + Sync {
    fn on_error(&self, context: &str, error: &RuntimeError);
}

/// Notified once a connection's per-connection handler has fully exited.
pub trait ConnectionSink: Send + Sync {
    fn on_client_disconnected(&self, endpoint: SocketAddr);
}

/// The manual-start port-conflict dialog (spec §4.5): asks a human whether
/// to accept a substitute port. Implementations outside of tests back this
/// with a host-provided confirmation capability (an editor UI dialog).
#[async_trait]
pub trait UserConfirmation: Send + Sync {
    async fn confirm_port_substitute(&self, original: u16, substitute: u16) -> bool;

    /// Invoked after the user accepts a substitute, so the host can push
    /// the new port out to any external config files that named the old
    /// one (spec §4.5 manual-start protocol, step 2).
    async fn update_external_configs(&self, new_port: u16);
}

/// The `delayCall`-style deferred-work capability spec §9 calls for,
/// modeled as an opaque `post(fn)` rather than a pseudo-static editor
/// hook. `mcpbridge-cli`'s `host`/`dev` commands implement this with
/// `tokio::spawn` + `tokio::time::sleep`.
pub trait ReloadScheduler: Send + Sync {
    fn schedule(&self, after: std::time::Duration, work: Box<dyn FnOnce() + Send>);
}
