//! Selects the MCP-client-facing transport (spec §2: "stdio or
//! HTTP/SSE"), mirroring the teacher's `create_transport` factory but
//! narrowed to the two kinds this front end actually exposes — no
//! WebSocket transport is specified for the MCP-facing side, so that
//! variant is dropped here (see `DESIGN.md`).

use pmcp::shared::{OptimizedSseConfig, OptimizedSseTransport, StdioTransport, Transport};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransportKind {
    Stdio,
    Sse,
}

/// Build the `pmcp` transport object for `kind`. Used to advertise/select
/// the transport; the front end's own JSON-RPC initialize/tool/keepalive
/// protocol logic in [`crate::session`] runs independently of which
/// concrete transport carries the bytes, exactly as the bridge server's
/// own framing is independent of the OS socket beneath it.
pub fn create_transport(kind: McpTransportKind, sse_url: &str) -> Box<dyn Transport> {
    match kind {
        McpTransportKind::Stdio => Box::new(StdioTransport::new()),
        McpTransportKind::Sse => {
            let config = OptimizedSseConfig {
                url: sse_url.to_string(),
                connection_timeout: Duration::from_secs(30),
                keepalive_interval: Duration::from_secs(15),
                max_reconnects: 5,
                reconnect_delay: Duration::from_secs(1),
                buffer_size: 100,
                flush_interval: Duration::from_millis(100),
                enable_pooling: true,
                max_connections: 10,
                enable_compression: false,
            };
            Box::new(OptimizedSseTransport::new(config))
        }
    }
}
