//! Tool catalog mirror (spec §4.6 "Tool manager"): fetches the editor's
//! tool catalog via `get-tool-details`, fingerprints it to decide whether
//! `tools/list_changed` is worth emitting, and clears itself whenever the
//! editor disconnects.

use crate::editor_client::EditorClient;
use crate::error::{FrontendError, Result};
use mcpbridge_core::tool::{fingerprint, ToolDescriptor};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// `get-tool-details` may return either a bare array or `{ "Tools": [...] }`
/// — spec §6: "the parser must accept both".
fn parse_catalog(value: Value) -> Result<Vec<ToolDescriptor>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("Tools") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(FrontendError::MalformedToolCatalog(
                    "expected an array or an object with a \"Tools\" array".to_string(),
                ))
            }
        },
        other => {
            return Err(FrontendError::MalformedToolCatalog(format!(
                "expected an array or object, got {other}"
            )))
        }
    };

    array
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| FrontendError::MalformedToolCatalog(e.to_string()))
        })
        .collect()
}

struct Snapshot {
    tools: Vec<ToolDescriptor>,
    fingerprint: String,
}

/// Caches the editor's tool catalog and decides, via the sorted-names MD5
/// fingerprint (spec §8 invariant 8), whether a fresh fetch is worth
/// re-announcing as `tools/list_changed`.
pub struct ToolManager {
    snapshot: Mutex<Option<Snapshot>>,
    refresh_lock: Mutex<()>,
    dev_mode: bool,
}

impl ToolManager {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            snapshot: Mutex::new(None),
            refresh_lock: Mutex::new(()),
            dev_mode,
        }
    }

    pub async fn snapshot(&self) -> Vec<ToolDescriptor> {
        self.snapshot
            .lock()
            .await
            .as_ref()
            .map(|s| s.tools.clone())
            .unwrap_or_default()
    }

    /// Fetch the catalog from the editor and return `true` if the
    /// sorted-tool-name fingerprint changed (the caller should then emit
    /// `tools/list_changed`). Single-flight: concurrent calls coalesce on
    /// the same underlying fetch via `refresh_lock`.
    pub async fn refresh_safe(&self, client: &EditorClient) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;

        let response = client
            .request("get-tool-details", serde_json::json!({ "dev": self.dev_mode }))
            .await?;
        let tools = parse_catalog(response)?;
        let new_fingerprint = fingerprint(&tools);

        let mut snapshot = self.snapshot.lock().await;
        let changed = snapshot
            .as_ref()
            .map(|s| s.fingerprint != new_fingerprint)
            .unwrap_or(true);

        *snapshot = Some(Snapshot {
            tools,
            fingerprint: new_fingerprint,
        });

        Ok(changed)
    }

    /// Clear the cache on editor disconnect (spec §4.6: "do not report
    /// tools to clients until re-connected"; §9 resolved open question:
    /// `clear_pending_requests`/cache clearing invoked on every disconnect
    /// path).
    pub async fn clear(&self) {
        *self.snapshot.lock().await = None;
    }

    pub async fn has_snapshot(&self) -> bool {
        self.snapshot.lock().await.is_some()
    }
}

pub type SharedToolManager = Arc<ToolManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: None,
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn parses_bare_array() {
        let value = json!([{"name": "a", "inputSchema": {}}]);
        let tools = parse_catalog(value).unwrap();
        assert_eq!(tools, vec![ToolDescriptor {
            name: "a".to_string(),
            description: None,
            input_schema: json!({}),
        }]);
    }

    #[test]
    fn parses_tools_wrapper() {
        let value = json!({"Tools": [{"name": "b", "inputSchema": {}}]});
        let tools = parse_catalog(value).unwrap();
        assert_eq!(tools[0].name, "b");
    }

    #[test]
    fn rejects_malformed_shapes() {
        let value = json!("not a catalog");
        assert!(parse_catalog(value).is_err());
    }

    #[tokio::test]
    async fn clear_empties_the_snapshot() {
        let manager = ToolManager::new(false);
        manager.snapshot.lock().await.replace(Snapshot {
            tools: vec![tool("x")],
            fingerprint: "abc".to_string(),
        });
        assert!(manager.has_snapshot().await);
        manager.clear().await;
        assert!(!manager.has_snapshot().await);
        assert!(manager.snapshot().await.is_empty());
    }
}
