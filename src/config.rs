//! Server configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) gives a working server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "TCP_CHAT_CONFIG";

/// Chat server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to listen on
    pub bind_addr: String,
    /// Whether chat traffic is appended to `history_path`
    pub history_enabled: bool,
    /// Append-only chat history file
    pub history_path: PathBuf,
    /// Admission limit on concurrent connections (unbounded when absent)
    pub max_clients: Option<usize>,
    /// Longest accepted inbound line in bytes
    pub max_line_length: usize,
    /// Per-connection outbound mailbox depth
    pub outbox_capacity: usize,
    /// How long shutdown waits for sessions before aborting them
    pub shutdown_grace_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            history_enabled: true,
            history_path: PathBuf::from("chat_history.txt"),
            max_clients: None,
            max_line_length: 1024,
            outbox_capacity: 32,
            shutdown_grace_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, AppError> {
        toml::from_str(s).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Load from the file named by `TCP_CHAT_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.history_enabled);
        assert_eq!(config.history_path, PathBuf::from("chat_history.txt"));
        assert_eq!(config.max_clients, None);
        assert_eq!(config.max_line_length, 1024);
        assert_eq!(config.outbox_capacity, 32);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            bind_addr = "127.0.0.1:9000"
            max_clients = 10
            history_enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.max_clients, Some(10));
        assert!(!config.history_enabled);
        assert_eq!(config.max_line_length, 1024);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::parse("max_clients = \"lots\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.toml");
        std::fs::write(&path, "outbox_capacity = 8\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.outbox_capacity, 8);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/chat.toml").unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
