use crate::constants::{DEFAULT_RECONNECTION_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, MIN_CONFIGURABLE_PORT};
use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Host-tunable settings layered over the fixed constants in
/// [`crate::constants`]. Populated from environment variables first, then
/// overridden by an optional TOML settings file, then validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BridgeSettings {
    /// Loopback port the Editor Bridge listens on. `None` means the host
    /// has not told the front-end where to find it (spec §4.6: FE must
    /// treat an absent `UNITY_TCP_PORT` as "no editor configured", not
    /// scan a range).
    pub editor_port: Option<u16>,

    /// `RECONNECTION_TIMEOUT`: how long the reconnecting-UI flag survives
    /// before the lifecycle controller clears it unilaterally.
    #[serde(with = "duration_secs")]
    pub reconnection_timeout: Duration,

    /// `SHUTDOWN_TIMEOUT`: bound on waiting for per-connection tasks during
    /// teardown before forced resource release.
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,

    /// Whether dev-only tools should be included in catalog snapshots
    /// (mirrors `NODE_ENV=development`).
    pub dev_mode: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            editor_port: None,
            reconnection_timeout: DEFAULT_RECONNECTION_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            dev_mode: false,
        }
    }
}

impl BridgeSettings {
    /// Build settings from process environment variables alone.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from environment variables, then overlay a TOML file
    /// if present. A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env()?;

        if let Some(path) = path {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
                let from_file: BridgeSettingsOverrides = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
                from_file.apply_to(&mut settings);
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(raw) = read_env_var("UNITY_TCP_PORT")? {
            let port: u32 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "UNITY_TCP_PORT",
                    reason: format!("'{raw}' is not an integer"),
                })?;
            self.editor_port = Some(validate_port(port)?);
        }

        if let Some(raw) = read_env_var("MCPBRIDGE_RECONNECT_TIMEOUT_SECS")? {
            self.reconnection_timeout = Duration::from_secs(parse_secs(
                "MCPBRIDGE_RECONNECT_TIMEOUT_SECS",
                &raw,
            )?);
        }

        if let Some(raw) = read_env_var("MCPBRIDGE_SHUTDOWN_TIMEOUT_SECS")? {
            self.shutdown_timeout =
                Duration::from_secs(parse_secs("MCPBRIDGE_SHUTDOWN_TIMEOUT_SECS", &raw)?);
        }

        if let Some(raw) = read_env_var("NODE_ENV")? {
            self.dev_mode = raw == "development";
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if let Some(port) = self.editor_port {
            validate_port(port as u32)?;
        }
        if self.reconnection_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "reconnection_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "shutdown_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// A sparse file-level overlay; every field optional so a settings file
/// only needs to mention what it's changing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct BridgeSettingsOverrides {
    editor_port: Option<u16>,
    reconnection_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
    dev_mode: Option<bool>,
}

impl BridgeSettingsOverrides {
    fn apply_to(self, settings: &mut BridgeSettings) {
        if let Some(port) = self.editor_port {
            settings.editor_port = Some(port);
        }
        if let Some(secs) = self.reconnection_timeout_secs {
            settings.reconnection_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            settings.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(dev) = self.dev_mode {
            settings.dev_mode = dev;
        }
    }
}

fn validate_port(port: u32) -> Result<u16> {
    if port == 0 || port > u16::MAX as u32 || port < MIN_CONFIGURABLE_PORT {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(port as u16)
}

fn parse_secs(field: &'static str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("'{raw}' is not a non-negative integer"),
    })
}

fn read_env_var(name: &'static str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvEncoding(name)),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation races across tests in the same process;
    // serialize the ones that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_are_valid() {
        let settings = BridgeSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.editor_port, None);
    }

    #[test]
    fn rejects_reserved_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("UNITY_TCP_PORT", "80");
        let result = BridgeSettings::from_env();
        std::env::remove_var("UNITY_TCP_PORT");
        assert!(matches!(result, Err(ConfigError::PortOutOfRange(80))));
    }

    #[test]
    fn rejects_out_of_range_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("UNITY_TCP_PORT", "70000");
        let result = BridgeSettings::from_env();
        std::env::remove_var("UNITY_TCP_PORT");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_valid_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("UNITY_TCP_PORT", "58888");
        let settings = BridgeSettings::from_env().unwrap();
        std::env::remove_var("UNITY_TCP_PORT");
        assert_eq!(settings.editor_port, Some(58888));
    }

    #[test]
    fn dev_mode_follows_node_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NODE_ENV", "development");
        let settings = BridgeSettings::from_env().unwrap();
        std::env::remove_var("NODE_ENV");
        assert!(settings.dev_mode);
    }

    #[test]
    fn file_overlay_overrides_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("UNITY_TCP_PORT", "58888");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcpbridge.toml");
        std::fs::write(&path, "editor_port = 54000\ndev_mode = true\n").unwrap();

        let settings = BridgeSettings::load(Some(&path)).unwrap();
        std::env::remove_var("UNITY_TCP_PORT");

        assert_eq!(settings.editor_port, Some(54000));
        assert!(settings.dev_mode);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings = BridgeSettings::load(Some(Path::new("/nonexistent/mcpbridge.toml")));
        assert!(settings.is_ok());
    }

    #[test]
    fn zero_reconnection_timeout_rejected_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcpbridge.toml");
        std::fs::write(&path, "reconnection_timeout_secs = 0\n").unwrap();
        let result = BridgeSettings::load(Some(&path));
        assert!(result.is_err());
    }
}
