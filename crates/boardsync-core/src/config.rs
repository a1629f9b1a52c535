//! Client configuration.

use crate::edit_buffer::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket API root (`ws://` or `wss://`).
    pub server_url: String,
    /// HTTP API root for snapshots and the append fallback.
    pub api_url: String,
    /// Bearer token for the storage service and the socket query string.
    pub token: Option<String>,
    pub user_id: String,
    pub email: String,
    /// Delay before reconnecting after an abnormal close.
    pub reconnect_delay_ms: u64,
    /// Maximum number of undoable local operations.
    pub history_limit: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/api".to_string(),
            api_url: "http://127.0.0.1:8080/api".to_string(),
            token: None,
            user_id: String::new(),
            email: String::new(),
            reconnect_delay_ms: 3000,
            history_limit: DEFAULT_HISTORY_LIMIT,
            canvas_width: 1280,
            canvas_height: 720,
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url(&self.server_url, &["ws", "wss"])?;
        check_url(&self.api_url, &["http", "https"])?;
        if self.user_id.trim().is_empty() {
            return Err(ConfigError::MissingValue("user_id"));
        }
        if self.email.trim().is_empty() {
            return Err(ConfigError::MissingValue("email"));
        }
        Ok(())
    }
}

fn check_url(value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl(format!(
            "{}: expected scheme {}",
            value,
            schemes.join(" or ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> ClientConfig {
        ClientConfig {
            user_id: "u1".into(),
            email: "a@example.com".into(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_defaults_validate_once_identity_set() {
        assert!(matches!(
            ClientConfig::default().validate(),
            Err(ConfigError::MissingValue("user_id"))
        ));
        valid().validate().unwrap();
        assert_eq!(valid().reconnect_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_toml() {
        let config = ClientConfig::from_toml(
            r#"
            user_id = "u9"
            email = "z@example.com"
            reconnect_delay_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.user_id, "u9");
        assert_eq!(config.reconnect_delay(), Duration::from_millis(500));
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_bad_scheme() {
        let config = ClientConfig {
            server_url: "http://localhost".into(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user_id = \"u1\"\nemail = \"a@example.com\"\ntoken = \"t\"").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.token.as_deref(), Some("t"));
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let result = ClientConfig::load(Path::new("/nonexistent/boardsync.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
