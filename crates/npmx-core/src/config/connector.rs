//! Connector configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the connector server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Interface to bind; the connector is meant for loopback only
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// npm executable used for every privileged command
    pub npm_path: PathBuf,

    /// Upper bound on a single npm invocation, in seconds
    #[serde(deserialize_with = "duration_secs")]
    pub command_timeout: Duration,

    /// Browser origins allowed to call the connector
    pub allowed_origins: Vec<String>,

    /// Web UI the connect link points at
    pub app_url: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 31415,
            npm_path: PathBuf::from("npm"),
            command_timeout: Duration::from_secs(60),
            allowed_origins: vec![
                "https://npmx.dev".to_string(),
                "http://localhost:3000".to_string(),
            ],
            app_url: "https://npmx.dev".to_string(),
        }
    }
}

impl ConnectorConfig {
    /// Reject values the connector cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "port must be non-zero; the connect link needs a fixed port".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "command_timeout must be at least 1 second".to_string(),
            ));
        }
        if !(self.app_url.starts_with("https://") || self.app_url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "app_url must be an http(s) URL, got {:?}",
                self.app_url
            )));
        }
        Ok(())
    }

    /// Socket address to bind (host:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Link the user opens to pair the web UI with this connector
    pub fn connect_url(&self, token: &str) -> String {
        format!(
            "{}/connect?port={}&token={}",
            self.app_url.trim_end_matches('/'),
            self.port,
            token
        )
    }
}

// Durations are written as whole seconds
fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}
