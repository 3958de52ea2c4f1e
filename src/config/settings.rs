//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::SocketAddr;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::mcp::messages::ServerInfo;
use crate::mcp::protocol::SERVER_NAME;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Server identity.
    #[serde(default)]
    pub server: ServerConfig,

    /// Channel the server listens on.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Documents to serve instead of the built-in seed set, in order.
    #[serde(default)]
    pub documents: Option<IndexMap<String, String>>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Server name must not be empty".to_string(),
            });
        }

        if let TransportConfig::Tcp { address } = &self.transport {
            address
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::ValidationError {
                    message: format!("Invalid TCP address '{address}': {e}"),
                })?;
        }

        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

/// Server identity reported during the handshake.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Server name.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Server version. Defaults to the crate version.
    #[serde(default)]
    pub version: Option<String>,
}

impl ServerConfig {
    /// Builds the identity sent in the initialize result.
    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        let mut info = ServerInfo {
            name: self.name.clone(),
            ..ServerInfo::default()
        };
        if let Some(version) = &self.version {
            info.version.clone_from(version);
        }
        info
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: None,
        }
    }
}

fn default_server_name() -> String {
    SERVER_NAME.to_string()
}

/// Transport selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Newline-delimited JSON over stdin and stdout.
    #[default]
    Stdio,
    /// Newline-delimited JSON over a single accepted TCP connection.
    Tcp {
        /// Address to listen on, e.g. `127.0.0.1:8050`.
        address: String,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r"{}";
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.name, "DocumentMCP");
        assert_eq!(config.transport, TransportConfig::Stdio);
        assert!(config.documents.is_none());
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "_comment": "Test config",
            "server": {
                "name": "Docs",
                "version": "9.9.9"
            },
            "transport": {
                "mode": "tcp",
                "address": "127.0.0.1:8050"
            },
            "documents": {
                "zeta.md": "last letter",
                "alpha.md": "first letter"
            },
            "logging": {
                "level": "debug"
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.transport,
            TransportConfig::Tcp {
                address: "127.0.0.1:8050".to_string()
            }
        );
        let ids: Vec<&String> = config.documents.as_ref().unwrap().keys().collect();
        assert_eq!(ids, ["zeta.md", "alpha.md"]);
        assert_eq!(config.logging.level, "debug");

        let info = config.server.server_info();
        assert_eq!(info.name, "Docs");
        assert_eq!(info.version, "9.9.9");
    }

    #[test]
    fn server_info_defaults_to_crate_version() {
        let info = ServerConfig::default().server_info();
        assert_eq!(info, ServerInfo::default());
    }

    #[test]
    fn logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn reject_empty_server_name() {
        let json = r#"{"server": {"name": "  "}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_bad_tcp_address() {
        let json = r#"{"transport": {"mode": "tcp", "address": "not-an-address"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_log_level() {
        let json = r#"{"logging": {"level": "verbose"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_transport_mode() {
        let json = r#"{"transport": {"mode": "sse"}}"#;
        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{
            "unknown_field": "value"
        }"#;

        let result: Result<Config, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
