//! Wire types for the auxiliary push-notification channel: a one-way,
//! newline-delimited JSON stream the host editor uses to tell an FE about
//! lifecycle events that happen outside of the request/response exchange
//! (reload starting, reload recovered, a disconnect, the tool catalog
//! changing) (spec §3, §6).

use serde::{Deserialize, Serialize};

/// The six event kinds the host editor may push, per the wire contract.
/// Serializes to the literal `SCREAMING_SNAKE_CASE` values spec §6 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushType {
    ConnectionEstablished,
    DomainReload,
    DomainReloadRecovered,
    UserDisconnect,
    UnityShutdown,
    ToolsChanged,
}

/// Advisory client-identifying fields carried by `ConnectionEstablished`.
/// Per spec §9's resolved open question, these are accepted, stored, and
/// exposed read-only; no core behavior ever branches on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unity_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    #[serde(rename = "type")]
    pub push_type: PushType,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<PushPayload>,
}

impl PushNotification {
    pub fn new(push_type: PushType, timestamp: impl Into<String>) -> Self {
        Self {
            push_type,
            timestamp: timestamp.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: PushPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Encode as a single newline-terminated JSON line, the wire format
    /// the push channel uses instead of `Content-Length` framing.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end())
    }
}
