//! Command line arguments and config resolution.

use boardsync_core::config::{ClientConfig, ConfigError};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Headless board client: joins a board, follows its log and optionally
/// writes PNG snapshots.
#[derive(Debug, Parser)]
#[command(name = "boardsync", version, about)]
pub struct Cli {
    /// Board to join
    pub board: String,

    /// Config file (defaults to the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebSocket API root, e.g. ws://127.0.0.1:8080/api
    #[arg(long)]
    pub server: Option<String>,

    /// HTTP API root, e.g. http://127.0.0.1:8080/api
    #[arg(long)]
    pub api: Option<String>,

    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Write a PNG of the board here whenever it changes
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Draw a demo stroke and label once connected
    #[arg(long)]
    pub demo: bool,

    /// Exit after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,
}

/// `<config dir>/boardsync/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("boardsync").join("config.toml"))
}

impl Cli {
    /// Load the config file (explicit path, or the default one if present)
    /// and apply flag overrides.
    pub fn resolve_config(&self) -> Result<ClientConfig, ConfigError> {
        let base = match self.config {
            Some(ref path) => ClientConfig::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => load_logged(&path)?,
                _ => ClientConfig::default(),
            },
        };
        let config = self.apply_overrides(base);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(ref server) = self.server {
            config.server_url = server.clone();
        }
        if let Some(ref api) = self.api {
            config.api_url = api.clone();
        }
        if self.token.is_some() {
            config.token = self.token.clone();
        }
        if let Some(ref user) = self.user {
            config.user_id = user.clone();
        }
        if let Some(ref email) = self.email {
            config.email = email.clone();
        }
        config
    }
}

fn load_logged(path: &Path) -> Result<ClientConfig, ConfigError> {
    log::info!("Loading config from {}", path.display());
    ClientConfig::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user_id = \"file-user\"\nemail = \"f@example.com\"\nreconnect_delay_ms = 250").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["boardsync", "B1", "--config", &path, "--user", "flag-user"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.user_id, "flag-user");
        assert_eq!(config.email, "f@example.com");
        assert_eq!(config.reconnect_delay_ms, 250);
    }

    #[test]
    fn test_flags_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "boardsync",
            "B1",
            "--config",
            &path,
            "--user",
            "u",
            "--email",
            "u@example.com",
            "--server",
            "wss://boards.example.com/api",
            "--demo",
        ])
        .unwrap();
        assert!(cli.demo);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.server_url, "wss://boards.example.com/api");
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from(["boardsync", "B1", "--config", &path]).unwrap();
        assert!(matches!(cli.resolve_config(), Err(ConfigError::MissingValue(_))));
    }
}
