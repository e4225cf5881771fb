//! Shared description of a single tool as advertised by the host editor
//! and cached by the front-end's tool manager.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Stable fingerprint of a tool list, used by the front end to decide
/// whether a fresh fetch actually changed anything worth re-announcing.
///
/// Spec §4.6/§8 invariant 8: this is an MD5 hash over the *sorted tool
/// names* only, not the full descriptors — a schema or description edit
/// under an unchanged name set does not itself trigger
/// `tools/list_changed`.
pub fn fingerprint(tools: &[ToolDescriptor]) -> String {
    let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    let canonical = names.join("\u{1}");
    format!("{:x}", md5::compute(canonical.as_bytes()))
}
