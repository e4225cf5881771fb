//! `mcpbridge host`: a standalone stand-in for the Editor Bridge half of
//! the protocol, for exercising the front end without a real host editor
//! attached. Answers `get-tool-details` with a small static catalog and
//! echoes anything else back as a no-op result.

use anyhow::Result;
use async_trait::async_trait;
use mcpbridge_runtime::{BridgeServer, ConnectionSink, ErrorSink, RequestProcessor, RuntimeError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

pub(crate) struct StaticCatalogProcessor;

#[async_trait]
impl RequestProcessor for StaticCatalogProcessor {
    async fn process(&self, _endpoint: SocketAddr, request: &str) -> Option<String> {
        let value: Value = serde_json::from_str(request).ok()?;
        let id = value.get("id").cloned();
        let method = value.get("method").and_then(Value::as_str)?;

        let result = match method {
            "get-tool-details" => json!([
                {
                    "name": "ping",
                    "description": "round-trip health check",
                    "inputSchema": {"type": "object", "properties": {}},
                },
                {
                    "name": "echo",
                    "description": "echoes its input back",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"text": {"type": "string"}},
                        "required": ["text"],
                    },
                },
            ]),
            "ping" => json!("pong"),
            _ => Value::Null,
        };

        let id = id?;
        Some(serde_json::to_string(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        })).ok()?)
    }
}

struct LoggingErrorSink;

impl ErrorSink for LoggingErrorSink {
    fn on_error(&self, context: &str, error: &RuntimeError) {
        tracing::error!(context, %error, "bridge server error");
    }
}

struct LoggingConnectionSink;

impl ConnectionSink for LoggingConnectionSink {
    fn on_client_disconnected(&self, endpoint: SocketAddr) {
        tracing::info!(%endpoint, "client disconnected");
    }
}

pub async fn execute(port: u16) -> Result<()> {
    let server = Arc::new(BridgeServer::new(
        Arc::new(StaticCatalogProcessor),
        Some(Arc::new(LoggingErrorSink)),
        Some(Arc::new(LoggingConnectionSink)),
    ));

    server.start(port).await?;
    let bound = server.bound_port().unwrap_or(port);
    println!("editor bridge stand-in listening on 127.0.0.1:{bound}");
    println!("point UNITY_TCP_PORT={bound} at `mcpbridge serve` to exercise the front end");

    tokio::signal::ctrl_c().await?;
    println!("shutting down");
    server.stop().await;

    Ok(())
}
