//! `mcpbridge serve`: the MCP-facing front end. Reads newline-delimited
//! JSON-RPC requests from stdin, dispatches `initialize`/`tools/list`/
//! `tools/call` against the editor bridge, and writes responses (plus any
//! `notifications/tools/list_changed`) to stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mcpbridge_config::BridgeSettings;
use mcpbridge_frontend::{
    editor_port_from_env, signals, EditorDiscovery, FrontendSession, McpNotifier, PushEvent,
    PushReceiveServer, ToolManager,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

struct StdoutNotifier(Mutex<tokio::io::Stdout>);

#[async_trait]
impl McpNotifier for StdoutNotifier {
    async fn notify_tools_list_changed(&self) {
        let line = json!({
            "jsonrpc": "2.0",
            "method": "notifications/tools/list_changed",
        });
        let mut stdout = self.0.lock().await;
        let _ = stdout.write_all(line.to_string().as_bytes()).await;
        let _ = stdout.write_all(b"\n").await;
        let _ = stdout.flush().await;
    }
}

pub async fn execute(settings_path: Option<&str>) -> Result<()> {
    let settings = match settings_path {
        Some(path) => BridgeSettings::load(Some(std::path::Path::new(path)))
            .context("failed to load bridge settings")?,
        None => BridgeSettings::from_env().context("failed to read bridge settings from env")?,
    };

    let editor_port = settings.editor_port.or_else(|| editor_port_from_env().ok());
    let (discovery_tx, discovery_rx) = mpsc::channel(64);
    let discovery = EditorDiscovery::singleton_or_init(|| {
        EditorDiscovery::new(editor_port.unwrap_or(0), discovery_tx)
    });

    let discovery_cancel = if let Some(port) = editor_port {
        tracing::info!(port, "editor discovery configured");
        let (cancel, _handle) = discovery.start();
        cancel
    } else {
        tracing::warn!("UNITY_TCP_PORT not configured; serving without an editor connection");
        CancellationToken::new()
    };

    let tool_manager = Arc::new(ToolManager::new(settings.dev_mode));
    let notifier: Arc<dyn McpNotifier> = Arc::new(StdoutNotifier(Mutex::new(tokio::io::stdout())));
    let session = FrontendSession::new(discovery, tool_manager, notifier);

    tokio::spawn(session.clone().run_discovery_events(discovery_rx));

    let push_server = PushReceiveServer::bind()
        .await
        .context("failed to bind push receive server")?;
    let push_port = push_server.bound_port()?;
    println!("push notification channel listening on 127.0.0.1:{push_port}");
    let (push_tx, push_rx) = mpsc::channel::<PushEvent>(64);
    let push_cancel = CancellationToken::new();
    tokio::spawn(push_server.run(push_tx, push_cancel.clone()));
    tokio::spawn(session.clone().run_push_events(push_rx));

    let (coordinator, watch) = signals::spawn_shutdown_watch(discovery_cancel);
    signals::install_panic_shutdown_hook(coordinator.clone());
    tokio::spawn(watch);

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            _ = wait_for_shutdown(&coordinator) => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(response) = dispatch(&session, &line).await {
                    stdout.write_all(response.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
        }
    }

    push_cancel.cancel();
    Ok(())
}

async fn wait_for_shutdown(coordinator: &Arc<signals::ShutdownCoordinator>) {
    while !coordinator.has_fired() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}

async fn dispatch(session: &Arc<FrontendSession>, line: &str) -> Option<String> {
    let request: Value = serde_json::from_str(line).ok()?;
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str)?;

    let result = match method {
        "initialize" => {
            let client_info = request
                .get("params")
                .and_then(|p| p.get("clientInfo"))
                .cloned()
                .unwrap_or(Value::Null);
            session.handle_initialize(&client_info).await
        }
        "tools/list" => session.list_tools().await,
        "tools/call" => session.call_tool(request.get("params").cloned().unwrap_or(Value::Null)).await,
        "ping" => json!("pong"),
        _ => Value::Null,
    };

    let id = id?;
    serde_json::to_string(&json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    }))
    .ok()
}
