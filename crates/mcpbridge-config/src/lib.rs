//! # mcpbridge-config
//!
//! Settings and validated constants shared across the editor-embedded IPC
//! bridge workspace: the recognized configuration table (buffer sizes,
//! timeouts, polling intervals) and the handful of values a host may
//! actually override (editor port, reconnection timeout, dev mode).
//!
//! ## Quick start
//!
//! ```rust
//! use mcpbridge_config::BridgeSettings;
//!
//! let settings = BridgeSettings::default();
//! assert!(settings.editor_port.is_none());
//! ```
//!
//! ## Validation rules
//!
//! - `editor_port` (from `UNITY_TCP_PORT`) must be a system-non-reserved
//!   port (1024..=65535).
//! - `reconnection_timeout` and `shutdown_timeout` must be non-zero.

pub mod constants;
pub mod error;
pub mod settings;

pub use error::{ConfigError, Result};
pub use settings::BridgeSettings;
