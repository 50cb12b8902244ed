//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relay servers to forward through
    #[serde(default)]
    pub server: Vec<ServerConfig>,
    /// Local redirect endpoint
    #[serde(default)]
    pub redir: RedirConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }
}

/// One relay server entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Relay address
    #[serde(default = "default_server_address")]
    pub address: String,
    /// Relay port
    #[serde(default = "default_server_port")]
    pub port: String,
    /// Shared key; only the first 256 bytes are used
    pub key: String,
}

/// Local redirect endpoint the packet filter diverts connections to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirConfig {
    /// Listen address
    #[serde(default = "default_redir_address")]
    pub address: String,
    /// Listen port
    #[serde(default = "default_redir_port")]
    pub port: String,
}

impl Default for RedirConfig {
    fn default() -> Self {
        Self {
            address: default_redir_address(),
            port: default_redir_port(),
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> String {
    "1205".to_string()
}

fn default_redir_address() -> String {
    "127.0.0.1".to_string()
}

fn default_redir_port() -> String {
    "1081".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [[server]]
            address = "relay.example.org"
            port = "1205"
            key = "secret"

            [[server]]
            key = "other secret"

            [redir]
            address = "0.0.0.0"
            port = "12345"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.len(), 2);
        assert_eq!(config.server[0].address, "relay.example.org");
        assert_eq!(config.server[0].key, "secret");
        assert_eq!(config.redir.address, "0.0.0.0");
        assert_eq!(config.redir.port, "12345");
    }

    #[test]
    fn test_server_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[server]]
            key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server[0].address, "0.0.0.0");
        assert_eq!(config.server[0].port, "1205");
        assert_eq!(config.redir.address, "127.0.0.1");
        assert_eq!(config.redir.port, "1081");
    }

    #[test]
    fn test_missing_key_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [[server]]
            address = "relay.example.org"
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.server.is_empty());
        assert_eq!(config.redir.port, "1081");
    }
}
