//! Crate-level error types for document-mcp.
//!
//! Errors raised inside the MCP layer live in [`crate::mcp::error`]; the
//! types here are the ones that end the process.

use std::path::PathBuf;

use thiserror::Error;

use crate::mcp::error::ProtocolError;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors that end a running server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The transport failed.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The client violated the protocol and the session was closed.
    #[error("session closed: {0}")]
    Protocol(#[from] ProtocolError),
}
