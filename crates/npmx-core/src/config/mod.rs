//! Connector configuration loading
//!
//! An explicitly named file must exist. The per-user file under the platform
//! config directory is optional; without it the built-in defaults apply.

mod connector;

pub use connector::ConnectorConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// `<config_dir>/npmx-connector/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("npmx-connector")
        .join("config.toml")
}

/// Parse and check a TOML document
pub fn parse_config(content: &str) -> Result<ConnectorConfig, ConfigError> {
    let config: ConnectorConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file that must exist
pub fn load_config(path: &Path) -> Result<ConnectorConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };
    parse_config(&content)
}

/// Load the config at `path`, or the defaults when there is no file there
pub fn load_optional_config(path: &Path) -> Result<ConnectorConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::NotFound(_)) => Ok(ConnectorConfig::default()),
        other => other,
    }
}
