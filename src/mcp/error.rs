//! Error types for the MCP dispatch layer.
//!
//! Only [`ProtocolError`] ends a session. Every other failure is reported to
//! the caller as a [`DispatchError`] and the session stays ready.

use serde_json::{json, Value};
use thiserror::Error;

use crate::documents::DocumentError;
use crate::mcp::protocol::{ErrorCode, JsonRpcError, JsonRpcErrorData, RequestId};
use crate::mcp::registry::CapabilityKind;
use crate::mcp::schema::FieldError;

/// Session-fatal protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or not a JSON object.
    #[error("malformed frame: {reason}")]
    Parse {
        /// Why decoding failed.
        reason: String,
    },

    /// The frame was JSON but not a valid JSON-RPC 2.0 message.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// The request ID, when it could be recovered.
        id: Option<RequestId>,
        /// Why the message was rejected.
        reason: String,
    },

    /// A message other than `initialize` arrived before the handshake.
    #[error("server not initialised: received `{method}` before `initialize`")]
    NotInitialized {
        /// The offending method.
        method: String,
    },

    /// `initialize` arrived after the handshake had already completed.
    #[error("server already initialised")]
    AlreadyInitialized,
}

impl ProtocolError {
    /// Creates an [`InvalidMessage`](Self::InvalidMessage) error.
    #[must_use]
    pub fn invalid_message(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            id,
            reason: reason.into(),
        }
    }

    /// Returns the JSON-RPC error code reported for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::InvalidMessage { .. } | Self::NotInitialized { .. } | Self::AlreadyInitialized => {
                ErrorCode::InvalidRequest
            }
        }
    }

    /// Returns the request ID embedded in the error, if any.
    #[must_use]
    pub const fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::InvalidMessage { id, .. } => id.as_ref(),
            _ => None,
        }
    }

    /// Short name of the error variant, reported in `error.data.kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } | Self::InvalidMessage { .. } => "MalformedFrame",
            Self::NotInitialized { .. } => "NotInitialized",
            Self::AlreadyInitialized => "AlreadyInitialized",
        }
    }

    /// Converts the error into a JSON-RPC error response.
    #[must_use]
    pub fn to_rpc(&self, id: Option<RequestId>) -> JsonRpcError {
        let id = id.or_else(|| self.request_id().cloned());
        JsonRpcError::new(
            id,
            JsonRpcErrorData::with_message(self.code(), self.to_string())
                .with_data(json!({ "kind": self.kind() })),
        )
    }
}

/// Errors raised while building the capability registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A capability of the same kind and name is already registered.
    #[error("duplicate {kind} capability: {name}")]
    DuplicateCapability {
        /// Kind of the capability.
        kind: CapabilityKind,
        /// Name or URI of the capability.
        name: String,
    },

    /// A resource URI template could not be parsed.
    #[error("invalid URI template '{template}': {reason}")]
    InvalidTemplate {
        /// The offending template.
        template: String,
        /// Description of what's wrong.
        reason: String,
    },
}

/// Failures raised by capability handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The document store rejected the operation.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Name of the underlying cause, when it belongs to the not-found family.
    #[must_use]
    pub const fn cause(&self) -> Option<&'static str> {
        match self {
            Self::Document(DocumentError::NotFound { .. }) => Some("DocumentNotFound"),
            Self::Failed(_) => None,
        }
    }
}

/// Per-request failures. These are encoded as error responses and leave the
/// session ready for the next request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The method is not part of the protocol surface.
    #[error("Method not found: {method}")]
    MethodNotFound {
        /// The unknown method.
        method: String,
    },

    /// The request parameters could not be decoded.
    #[error("Invalid params: {message}")]
    InvalidParams {
        /// Description of what's wrong.
        message: String,
    },

    /// No tool is registered under the requested name.
    #[error("Unknown tool: {name}")]
    ToolNotFound {
        /// The requested tool.
        name: String,
    },

    /// No prompt is registered under the requested name.
    #[error("Unknown prompt: {name}")]
    PromptNotFound {
        /// The requested prompt.
        name: String,
    },

    /// No resource or resource template matches the URI.
    #[error("Unknown resource: {uri}")]
    ResourceNotFound {
        /// The requested URI.
        uri: String,
    },

    /// Argument validation failed; carries every field error.
    #[error("Invalid arguments for {name}: {}", join_fields(.errors))]
    InvalidArguments {
        /// The capability being invoked.
        name: String,
        /// All field-level problems.
        errors: Vec<FieldError>,
    },

    /// The bound handler failed.
    #[error("Error executing {kind} {name}: {source}")]
    Execution {
        /// Kind of the capability that failed.
        kind: CapabilityKind,
        /// Name of the capability that failed.
        name: String,
        /// The handler's failure.
        source: HandlerError,
    },

    /// A result could not be encoded.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of what went wrong.
        message: String,
    },
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatchError {
    /// Returns the JSON-RPC error code reported for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::InvalidParams { .. }
            | Self::ToolNotFound { .. }
            | Self::PromptNotFound { .. }
            | Self::InvalidArguments { .. } => ErrorCode::InvalidParams,
            Self::ResourceNotFound { .. } => ErrorCode::ResourceNotFound,
            Self::Execution { .. } => ErrorCode::ExecutionFailed,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Short name of the error variant, reported in `error.data.kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "MethodNotFound",
            Self::InvalidParams { .. } => "InvalidParams",
            Self::ToolNotFound { .. } => "ToolNotFound",
            Self::PromptNotFound { .. } => "PromptNotFound",
            Self::ResourceNotFound { .. } => "ResourceNotFound",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::Execution {
                kind: CapabilityKind::Tool,
                ..
            } => "ToolExecutionError",
            Self::Execution { .. } => "ExecutionError",
            Self::Internal { .. } => "InternalError",
        }
    }

    fn data(&self) -> Value {
        let mut data = json!({ "kind": self.kind() });
        match self {
            Self::InvalidArguments { errors, .. } => {
                data["fields"] = serde_json::to_value(errors).unwrap_or(Value::Null);
            }
            Self::Execution { source, .. } => {
                if let Some(cause) = source.cause() {
                    data["cause"] = json!(cause);
                }
            }
            _ => {}
        }
        data
    }

    /// Converts the error into a JSON-RPC error response.
    #[must_use]
    pub fn into_rpc(self, id: RequestId) -> JsonRpcError {
        let data = self.data();
        JsonRpcError::new(
            Some(id),
            JsonRpcErrorData::with_message(self.code(), self.to_string()).with_data(data),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::schema::{FieldErrorKind, ParamType};

    #[test]
    fn protocol_error_codes() {
        let parse = ProtocolError::Parse {
            reason: "eof".to_string(),
        };
        assert_eq!(parse.code(), ErrorCode::ParseError);
        assert_eq!(
            ProtocolError::AlreadyInitialized.code(),
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn protocol_error_rpc_carries_kind() {
        let err = ProtocolError::NotInitialized {
            method: "tools/list".to_string(),
        };
        let rpc = err.to_rpc(Some(RequestId::Number(3)));
        assert_eq!(rpc.id, Some(RequestId::Number(3)));
        assert_eq!(rpc.error.code, -32600);
        assert_eq!(rpc.error.data.unwrap()["kind"], "NotInitialized");
    }

    #[test]
    fn invalid_arguments_lists_every_field() {
        let err = DispatchError::InvalidArguments {
            name: "edit_document".to_string(),
            errors: vec![
                FieldError::new("doc_id", FieldErrorKind::MissingRequired),
                FieldError::new(
                    "new_str",
                    FieldErrorKind::TypeMismatch {
                        expected: ParamType::String,
                        found: "number",
                    },
                ),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("doc_id"));
        assert!(msg.contains("new_str"));

        let rpc = err.into_rpc(RequestId::Number(1));
        assert_eq!(rpc.error.code, -32602);
        let data = rpc.error.data.unwrap();
        assert_eq!(data["kind"], "InvalidArguments");
        assert_eq!(data["fields"].as_array().unwrap().len(), 2);
        assert_eq!(data["fields"][0]["field"], "doc_id");
        assert_eq!(data["fields"][0]["error"], "MissingRequired");
        assert_eq!(data["fields"][1]["expected"], "string");
    }

    #[test]
    fn tool_execution_error_reports_cause() {
        let err = DispatchError::Execution {
            kind: CapabilityKind::Tool,
            name: "read_doc_contents".to_string(),
            source: DocumentError::NotFound {
                id: "missing.md".to_string(),
            }
            .into(),
        };
        assert!(err.to_string().contains("Doc with id missing.md not found"));

        let rpc = err.into_rpc(RequestId::Number(9));
        let data = rpc.error.data.unwrap();
        assert_eq!(data["kind"], "ToolExecutionError");
        assert_eq!(data["cause"], "DocumentNotFound");
    }

    #[test]
    fn resource_not_found_code() {
        let err = DispatchError::ResourceNotFound {
            uri: "docs://nope".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::ResourceNotFound);
        assert_eq!(err.kind(), "ResourceNotFound");
    }
}
