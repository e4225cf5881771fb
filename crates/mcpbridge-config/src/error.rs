use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port {0}: must be in 1..=65535 and not a system-reserved port (<1024)")]
    PortOutOfRange(u32),

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("environment variable {0} is not valid UTF-8")]
    InvalidEnvEncoding(&'static str),

    #[error("failed to read settings file {0}: {1}")]
    IoError(std::path::PathBuf, #[source] std::io::Error),

    #[error("failed to parse settings file {0}: {1}")]
    ParseError(std::path::PathBuf, #[source] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
