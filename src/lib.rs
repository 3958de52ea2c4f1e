//! document-mcp: MCP server exposing a document store to AI assistants
//!
//! The server offers a small, fixed set of capabilities over JSON-RPC:
//!
//! - **Tools**: read a document, edit a document by string replacement
//! - **Resources**: the list of document ids, and each document's content
//! - **Prompts**: instructions for reformatting or summarising a document
//!
//! Every call is resolved through the capability registry, its arguments are
//! checked against the declared parameters, and only then is the handler run.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and validation
//! - [`documents`] - Document store and the document capabilities
//! - [`error`] - Error types
//! - [`mcp`] - MCP protocol implementation

pub mod config;
pub mod documents;
pub mod error;
pub mod mcp;
