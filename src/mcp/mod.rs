//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP server side for exposing tools, resources
//! and prompts to AI assistants. Messages are JSON-RPC 2.0, one per line,
//! over stdio or a single TCP connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            MCP Server                            │
//! │                                                                  │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │   │   Session   │───▶│ Dispatcher  │───▶│     Registry     │     │
//! │   │ (transport) │    │ (lifecycle) │    │    (handlers)    │     │
//! │   └─────────────┘    └─────────────┘    └──────────────────┘     │
//! │          │                  │                    │               │
//! │          ▼                  ▼                    ▼               │
//! │   ┌──────────────────────────────────────────────────────┐       │
//! │   │       JSON-RPC Messages  /  Schema Validation        │       │
//! │   └──────────────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05 and also
//! accepts 2025-03-26.

pub mod dispatcher;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;

pub use dispatcher::{Dispatcher, SessionState};
pub use error::{DispatchError, HandlerError, ProtocolError, RegistryError};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::{CapabilityDescriptor, CapabilityKind, Registry};
pub use session::Session;
pub use transport::{LineTransport, StdioTransport, TcpTransport, Transport};
