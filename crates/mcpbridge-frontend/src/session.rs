//! Front-end session state (spec §4.6): MCP `initialize` handling, client
//! compatibility classification, and the glue that wires editor discovery
//! and push-channel events into tool-catalog refreshes and
//! `tools/list_changed` notifications.

use crate::discovery::{DiscoveryEvent, EditorDiscovery};
use crate::editor_client::EditorClient;
use crate::init_state::{InitAction, InitGuard, InitializeResult};
use crate::push_receive::PushEvent;
use crate::recovery::StuckDetector;
use crate::tool_manager::SharedToolManager;
use async_trait::async_trait;
use mcpbridge_core::retry::with_timeout;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// How long an unsupported client's `initialize` blocks on the editor
/// connection before giving up and returning an empty tool list (spec
/// §4.6: "block initialize on editor connection up to 10 s").
const UNSUPPORTED_CLIENT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Clients known to honor `notifications/tools/list_changed`. Anything
/// not on this allow-list (including an unrecognized `clientInfo.name`)
/// is treated conservatively as unsupported and gets its tool list
/// embedded in the initialize response instead (spec §4.6, §GLOSSARY
/// "List-changed support").
const LIST_CHANGED_SUPPORTING_CLIENTS: &[&str] =
    &["claude code", "claude-code", "visual studio code", "vscode", "inspector", "mcp inspector"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientClass {
    Supported,
    Unsupported,
}

pub fn classify_client(client_name: &str) -> ClientClass {
    let normalized = client_name.to_ascii_lowercase();
    if LIST_CHANGED_SUPPORTING_CLIENTS
        .iter()
        .any(|known| normalized.contains(known))
    {
        ClientClass::Supported
    } else {
        ClientClass::Unsupported
    }
}

/// Narrow interface to the MCP SDK's own notification-sending surface,
/// so this module never reaches into `mcp_transport` directly (spec §9:
/// callbacks over back-pointers).
#[async_trait]
pub trait McpNotifier: Send + Sync {
    async fn notify_tools_list_changed(&self);
}

pub struct FrontendSession {
    discovery: Arc<EditorDiscovery>,
    tool_manager: SharedToolManager,
    init_guard: Arc<InitGuard>,
    stuck: Arc<StuckDetector>,
    notifier: Arc<dyn McpNotifier>,
}

impl FrontendSession {
    pub fn new(
        discovery: Arc<EditorDiscovery>,
        tool_manager: SharedToolManager,
        notifier: Arc<dyn McpNotifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            discovery,
            tool_manager,
            init_guard: Arc::new(InitGuard::default()),
            stuck: Arc::new(StuckDetector::default()),
            notifier,
        })
    }

    /// Handle one MCP `initialize` request. `client_info` is the raw
    /// `clientInfo` object from the request params.
    pub async fn handle_initialize(self: &Arc<Self>, client_info: &Value) -> Value {
        match self.init_guard.begin().await {
            InitAction::Cached(result) => result.0,
            InitAction::Await(mut rx) => match rx.recv().await {
                Ok(result) => result.0,
                Err(_) => self.bare_initialize_result(None),
            },
            InitAction::Run => {
                let client_name = client_info
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let result = self.run_initialize(&client_name).await;
                self.init_guard.complete(InitializeResult(result.clone())).await;
                result
            }
        }
    }

    async fn run_initialize(self: &Arc<Self>, client_name: &str) -> Value {
        match classify_client(client_name) {
            ClientClass::Supported => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.background_connect_and_refresh().await;
                });
                self.bare_initialize_result(None)
            }
            ClientClass::Unsupported => {
                if let Some(client) =
                    with_timeout(UNSUPPORTED_CLIENT_INIT_TIMEOUT, self.wait_for_editor_client()).await
                {
                    let _ = self.tool_manager.refresh_safe(&client).await;
                }
                self.bare_initialize_result(Some(self.tool_manager.snapshot().await))
            }
        }
    }

    async fn wait_for_editor_client(&self) -> Option<Arc<EditorClient>> {
        loop {
            if let Some(client) = self.discovery.current_client().await {
                return Some(client);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Supported-client background path (spec §4.6): connect and fetch
    /// tools without blocking `initialize`, then announce
    /// `tools/list_changed` once.
    async fn background_connect_and_refresh(self: Arc<Self>) {
        if let Some(client) = with_timeout(UNSUPPORTED_CLIENT_INIT_TIMEOUT, self.wait_for_editor_client()).await {
            if let Ok(true) = self.tool_manager.refresh_safe(&client).await {
                self.notifier.notify_tools_list_changed().await;
            }
        }
    }

    fn bare_initialize_result(&self, embedded_tools: Option<Vec<mcpbridge_core::tool::ToolDescriptor>>) -> Value {
        let mut result = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": { "listChanged": true } },
            "serverInfo": { "name": "mcpbridge-frontend", "version": env!("CARGO_PKG_VERSION") },
        });
        if let Some(tools) = embedded_tools {
            result["tools"] = json!(tools);
        }
        result
    }

    /// Drains [`DiscoveryEvent`]s and wires them into tool-cache state
    /// (spec §4.6 tool manager "clear cache on disconnect"; §4.7
    /// "connection_established triggers ... a tool refresh").
    pub async fn run_discovery_events(self: Arc<Self>, mut events: mpsc::Receiver<DiscoveryEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                DiscoveryEvent::Connected(client) => {
                    self.stuck.on_connected().await;
                    if let Ok(true) = self.tool_manager.refresh_safe(&client).await {
                        self.notifier.notify_tools_list_changed().await;
                    }
                }
                DiscoveryEvent::Disconnected => {
                    self.stuck.on_disconnected().await;
                    self.tool_manager.clear().await;
                }
                DiscoveryEvent::EditorNotification(_) => {
                    if let Some(client) = self.discovery.current_client().await {
                        if let Ok(true) = self.tool_manager.refresh_safe(&client).await {
                            self.notifier.notify_tools_list_changed().await;
                        }
                    }
                }
            }
        }
    }

    /// Drains [`PushEvent`]s (spec §4.7 "Integration with FE core").
    pub async fn run_push_events(self: Arc<Self>, mut events: mpsc::Receiver<PushEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                PushEvent::ConnectionEstablished => {
                    if let Some(client) = self.discovery.current_client().await {
                        let _ = self.tool_manager.refresh_safe(&client).await;
                    }
                }
                PushEvent::ToolsChanged | PushEvent::DomainReloadRecovered => {
                    if let Some(client) = self.discovery.current_client().await {
                        if let Ok(true) = self.tool_manager.refresh_safe(&client).await {
                            self.notifier.notify_tools_list_changed().await;
                        }
                    }
                }
                PushEvent::DomainReloadStart => {
                    self.tool_manager.clear().await;
                }
                PushEvent::Disconnected(_reason) => {
                    self.stuck.on_disconnected().await;
                    self.tool_manager.clear().await;
                }
            }
        }
    }

    pub fn stuck_detector(&self) -> Arc<StuckDetector> {
        self.stuck.clone()
    }

    /// `tools/list` passthrough: the cached catalog, no editor round trip.
    pub async fn list_tools(&self) -> Value {
        json!({ "tools": self.tool_manager.snapshot().await })
    }

    /// `tools/call` passthrough: forwards to the connected editor, mapping
    /// "no editor connected" to an MCP-shaped error object rather than
    /// failing the whole JSON-RPC response.
    pub async fn call_tool(&self, params: Value) -> Value {
        match self.discovery.current_client().await {
            Some(client) => match client.request("tools/call", params).await {
                Ok(result) => result,
                Err(e) => json!({ "error": { "message": e.to_string() } }),
            },
            None => json!({ "error": { "message": "editor is not connected" } }),
        }
    }
}

/// `clear_pending_requests` equivalent (spec §9 resolved open question):
/// a per-session registry of in-flight oneshot senders that every
/// disconnect path drains, so a caller awaiting a response that will
/// never arrive gets a prompt error instead of hanging.
pub struct PendingRequests {
    senders: Mutex<Vec<tokio::sync::oneshot::Sender<()>>>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl PendingRequests {
    pub async fn register(&self) -> tokio::sync::oneshot::Receiver<()> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.senders.lock().await.push(tx);
        rx
    }

    pub async fn clear_pending(&self) {
        for tx in self.senders.lock().await.drain(..) {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_is_treated_as_unsupported() {
        assert_eq!(classify_client("Cursor"), ClientClass::Unsupported);
    }

    #[test]
    fn claude_code_is_supported() {
        assert_eq!(classify_client("Claude Code"), ClientClass::Supported);
    }

    #[test]
    fn vscode_is_supported() {
        assert_eq!(classify_client("Visual Studio Code"), ClientClass::Supported);
    }

    #[test]
    fn inspector_is_supported() {
        assert_eq!(classify_client("MCP Inspector"), ClientClass::Supported);
    }

    #[test]
    fn unknown_client_defaults_to_unsupported() {
        assert_eq!(classify_client("SomeOtherEditor"), ClientClass::Unsupported);
    }

    #[tokio::test]
    async fn pending_requests_resolve_on_clear() {
        let pending = PendingRequests::default();
        let rx = pending.register().await;
        pending.clear_pending().await;
        assert!(rx.await.is_ok());
    }
}
