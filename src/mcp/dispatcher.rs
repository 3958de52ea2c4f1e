//! Request dispatcher and session state machine.
//!
//! ```text
//! AwaitingHandshake ──initialize──▶ Ready ──request──▶ Dispatching ──response──▶ Ready
//!         │                          │
//!         └──────── protocol error ──┴──────────────────────────────▶ Closed
//! ```
//!
//! Frames are handled strictly one at a time: each request produces exactly
//! one response before the next frame is looked at. Per-request failures are
//! answered with an error response and leave the session `Ready`; protocol
//! errors close it for good.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::documents::DocumentStore;
use crate::mcp::error::{DispatchError, ProtocolError};
use crate::mcp::messages::{
    decode_params, GetPromptResult, InitializeParams, InitializeResult, NamedCallParams,
    PromptDefinition, ReadResourceResult, ResourceContents, ResourceReadParams,
    ServerCapabilities, ServerInfo, ToolCallResult, ToolDefinition,
};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    OutgoingMessage, RequestId, MCP_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::mcp::registry::{CapabilityDescriptor, CapabilityKind, Registry, ToolOutput};
use crate::mcp::schema::{validate, ValidationResult};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the initialize request.
    AwaitingHandshake,
    /// Handshake done; waiting for the next request.
    Ready,
    /// A request is being processed.
    Dispatching,
    /// The session ended; no further frames are accepted.
    Closed,
}

/// A single decoded capability request.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// ID of the request being answered.
    pub request_id: RequestId,
    /// Kind of capability requested.
    pub kind: CapabilityKind,
    /// Tool or prompt name, or resource URI.
    pub name: String,
    /// Arguments exactly as supplied by the caller.
    pub raw_arguments: Map<String, Value>,
}

impl Invocation {
    /// Decodes a tools/call or prompts/get request.
    fn named(req: &JsonRpcRequest, kind: CapabilityKind) -> Result<Self, DispatchError> {
        let params: NamedCallParams = decode_params(req.params.as_ref())
            .map_err(|message| DispatchError::InvalidParams { message })?;

        let raw_arguments = match params.arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(DispatchError::InvalidParams {
                    message: format!("arguments must be an object, got {other}"),
                })
            }
        };

        Ok(Self {
            request_id: req.id.clone(),
            kind,
            name: params.name,
            raw_arguments,
        })
    }

    /// Decodes a resources/read request.
    fn resource(req: &JsonRpcRequest) -> Result<Self, DispatchError> {
        let params: ResourceReadParams = decode_params(req.params.as_ref())
            .map_err(|message| DispatchError::InvalidParams { message })?;

        Ok(Self {
            request_id: req.id.clone(),
            kind: CapabilityKind::Resource,
            name: params.uri,
            raw_arguments: Map::new(),
        })
    }
}

/// Routes decoded messages to the registry and encodes the replies.
pub struct Dispatcher {
    state: SessionState,
    registry: Registry,
    store: Box<dyn DocumentStore + Send>,
    server_info: ServerInfo,
    protocol_version: Option<String>,
    fatal: Option<ProtocolError>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state)
            .field("server_info", &self.server_info)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher awaiting the handshake.
    #[must_use]
    pub fn new(
        registry: Registry,
        store: Box<dyn DocumentStore + Send>,
        server_info: ServerInfo,
    ) -> Self {
        Self {
            state: SessionState::AwaitingHandshake,
            registry,
            store,
            server_info,
            protocol_version: None,
            fatal: None,
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` once the session has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The protocol error that closed the session, if any.
    #[must_use]
    pub const fn fatal_error(&self) -> Option<&ProtocolError> {
        self.fatal.as_ref()
    }

    /// Negotiated protocol version (set after the handshake).
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// The capability registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Ends the session without an error, e.g. when the channel closes.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::info!("session closed");
            self.state = SessionState::Closed;
        }
    }

    /// Handles one raw frame, returning the reply to write, if any.
    ///
    /// Undecodable frames close the session. Frames arriving after the
    /// session closed are ignored.
    pub fn handle_frame(&mut self, frame: &str) -> Option<OutgoingMessage> {
        if self.is_closed() {
            tracing::debug!("frame ignored, session closed");
            return None;
        }

        match parse_message(frame) {
            Ok(msg) => self.handle_message(msg),
            Err(error) => {
                let id = error.request_id().cloned();
                Some(self.fail(error, id))
            }
        }
    }

    /// Handles one raw frame as read from the transport.
    ///
    /// A frame that is not valid UTF-8 cannot be decoded and closes the
    /// session like any other malformed frame.
    pub fn handle_bytes(&mut self, frame: &[u8]) -> Option<OutgoingMessage> {
        match std::str::from_utf8(frame) {
            Ok(text) => self.handle_frame(text),
            Err(_) if self.is_closed() => None,
            Err(e) => Some(self.fail(
                ProtocolError::Parse {
                    reason: format!("frame is not valid UTF-8: {e}"),
                },
                None,
            )),
        }
    }

    /// Handles one decoded message, returning the reply to write, if any.
    pub fn handle_message(&mut self, msg: IncomingMessage) -> Option<OutgoingMessage> {
        match self.state {
            SessionState::Closed => None,
            SessionState::AwaitingHandshake => self.handle_before_handshake(msg),
            SessionState::Ready | SessionState::Dispatching => match msg {
                IncomingMessage::Request(req) => Some(self.handle_request(&req)),
                IncomingMessage::Notification(notif) => {
                    Self::handle_notification(&notif);
                    None
                }
            },
        }
    }

    fn handle_before_handshake(&mut self, msg: IncomingMessage) -> Option<OutgoingMessage> {
        match msg {
            IncomingMessage::Request(req) if req.method == "initialize" => {
                Some(match self.handle_initialize(&req) {
                    Ok(resp) => resp.into(),
                    Err(error) => error.into_rpc(req.id.clone()).into(),
                })
            }
            IncomingMessage::Request(req) => Some(self.fail(
                ProtocolError::NotInitialized {
                    method: req.method.clone(),
                },
                Some(req.id),
            )),
            IncomingMessage::Notification(notif) => {
                // A notification cannot be answered; the session just ends.
                let _ = self.fail(
                    ProtocolError::NotInitialized {
                        method: notif.method,
                    },
                    None,
                );
                None
            }
        }
    }

    /// Records a protocol error, closes the session and encodes the error.
    fn fail(&mut self, error: ProtocolError, id: Option<RequestId>) -> OutgoingMessage {
        tracing::warn!(error = %error, "protocol error, closing session");
        let response = error.to_rpc(id);
        self.fatal = Some(error);
        self.state = SessionState::Closed;
        response.into()
    }

    fn handle_notification(notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => tracing::debug!("client reported initialised"),
            "notifications/cancelled" => {
                // Requests complete before the next frame is read, so there
                // is never anything in flight to cancel.
                tracing::debug!("cancellation ignored");
            }
            other => tracing::debug!(method = other, "unknown notification ignored"),
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, DispatchError> {
        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value::<InitializeParams>(p.clone()))
            .transpose()
            .map_err(|e| DispatchError::InvalidParams {
                message: format!("Invalid initialize params: {e}"),
            })?
            .ok_or_else(|| DispatchError::InvalidParams {
                message: "Missing initialize params".to_string(),
            })?;

        let client_name = params.client_info.as_ref().map_or("", |c| c.name.as_str());
        let negotiated_version =
            if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
                params.protocol_version.clone()
            } else {
                MCP_PROTOCOL_VERSION.to_string()
            };

        tracing::info!(
            client_name,
            requested_version = %params.protocol_version,
            negotiated_version = %negotiated_version,
            "initialize"
        );

        let result = InitializeResult {
            protocol_version: negotiated_version.clone(),
            capabilities: ServerCapabilities::default(),
            server_info: self.server_info.clone(),
            tools: self.tool_definitions(),
            resources: self
                .registry
                .resources()
                .map(CapabilityDescriptor::resource_entry)
                .collect(),
            prompts: self
                .registry
                .iter(CapabilityKind::Prompt)
                .map(CapabilityDescriptor::prompt_definition)
                .collect(),
        };

        let result = encode(&result)?;

        self.protocol_version = Some(negotiated_version);
        self.state = SessionState::Ready;

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles a request once the handshake is complete.
    fn handle_request(&mut self, req: &JsonRpcRequest) -> OutgoingMessage {
        if req.method == "initialize" {
            return self.fail(ProtocolError::AlreadyInitialized, Some(req.id.clone()));
        }

        self.state = SessionState::Dispatching;
        tracing::debug!(id = %req.id, method = %req.method, "dispatching");

        let result = match req.method.as_str() {
            "ping" => Ok(Value::Object(Map::new())),
            "tools/list" => encode(&ToolsList {
                tools: self.tool_definitions(),
            }),
            "resources/list" => self.resources_list(false),
            "resources/templates/list" => self.resources_list(true),
            "prompts/list" => encode(&PromptsList {
                prompts: self
                    .registry
                    .iter(CapabilityKind::Prompt)
                    .map(CapabilityDescriptor::prompt_definition)
                    .collect(),
            }),
            "tools/call" => {
                Invocation::named(req, CapabilityKind::Tool).and_then(|inv| self.invoke(&inv))
            }
            "resources/read" => Invocation::resource(req).and_then(|inv| self.invoke(&inv)),
            "prompts/get" => {
                Invocation::named(req, CapabilityKind::Prompt).and_then(|inv| self.invoke(&inv))
            }
            _ => Err(DispatchError::MethodNotFound {
                method: req.method.clone(),
            }),
        };

        self.state = SessionState::Ready;

        match result {
            Ok(value) => JsonRpcResponse::success(req.id.clone(), value).into(),
            Err(error) => {
                tracing::debug!(id = %req.id, error = %error, "request failed");
                error.into_rpc(req.id.clone()).into()
            }
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry
            .iter(CapabilityKind::Tool)
            .map(CapabilityDescriptor::tool_definition)
            .collect()
    }

    fn resources_list(&self, templates: bool) -> Result<Value, DispatchError> {
        let kind = if templates {
            CapabilityKind::ResourcePattern
        } else {
            CapabilityKind::Resource
        };
        let entries: Vec<_> = self
            .registry
            .iter(kind)
            .map(CapabilityDescriptor::resource_entry)
            .collect();

        let mut result = Map::new();
        let key = if templates { "resourceTemplates" } else { "resources" };
        result.insert(key.to_string(), encode(&entries)?);
        Ok(Value::Object(result))
    }

    /// Routes a decoded invocation to the handler for its kind.
    fn invoke(&mut self, inv: &Invocation) -> Result<Value, DispatchError> {
        tracing::debug!(
            id = %inv.request_id,
            kind = %inv.kind,
            name = %inv.name,
            "invoking capability"
        );

        match inv.kind {
            CapabilityKind::Tool => self.call_tool(inv),
            CapabilityKind::Resource | CapabilityKind::ResourcePattern => self.read_resource(inv),
            CapabilityKind::Prompt => self.get_prompt(inv),
        }
    }

    /// Resolves, validates and runs a tool.
    fn call_tool(&mut self, inv: &Invocation) -> Result<Value, DispatchError> {
        let descriptor = self
            .registry
            .lookup_exact(CapabilityKind::Tool, &inv.name)
            .ok_or_else(|| DispatchError::ToolNotFound {
                name: inv.name.clone(),
            })?;

        let args = match validate(descriptor.params(), &inv.raw_arguments) {
            ValidationResult::Valid(args) => args,
            ValidationResult::Invalid(errors) => {
                return Err(DispatchError::InvalidArguments {
                    name: inv.name.clone(),
                    errors,
                })
            }
        };

        let output = descriptor
            .invoke_tool(self.store.as_mut(), &args)
            .map_err(|source| DispatchError::Execution {
                kind: CapabilityKind::Tool,
                name: inv.name.clone(),
                source,
            })?;

        let result = match output {
            ToolOutput::Text(text) => ToolCallResult::text(text),
            ToolOutput::Structured(value) => ToolCallResult::text(value.to_string()),
            ToolOutput::Empty => ToolCallResult::empty(),
        };
        encode(&result)
    }

    /// Resolves and reads a resource.
    fn read_resource(&self, inv: &Invocation) -> Result<Value, DispatchError> {
        let (descriptor, params) =
            self.registry
                .lookup_resource(&inv.name)
                .ok_or_else(|| DispatchError::ResourceNotFound {
                    uri: inv.name.clone(),
                })?;

        let text = descriptor
            .invoke_resource(self.store.as_ref(), &params)
            .map_err(|source| DispatchError::Execution {
                kind: descriptor.kind(),
                name: inv.name.clone(),
                source,
            })?;

        encode(&ReadResourceResult {
            contents: vec![ResourceContents {
                uri: inv.name.clone(),
                mime_type: descriptor.mime_type().unwrap_or("text/plain").to_string(),
                text,
            }],
        })
    }

    /// Resolves, validates and expands a prompt.
    fn get_prompt(&self, inv: &Invocation) -> Result<Value, DispatchError> {
        let descriptor = self
            .registry
            .lookup_exact(CapabilityKind::Prompt, &inv.name)
            .ok_or_else(|| DispatchError::PromptNotFound {
                name: inv.name.clone(),
            })?;

        let args = validate(descriptor.params(), &inv.raw_arguments)
            .into_result()
            .map_err(|errors| DispatchError::InvalidArguments {
                name: inv.name.clone(),
                errors,
            })?;

        let messages = descriptor
            .invoke_prompt(&args)
            .map_err(|source| DispatchError::Execution {
                kind: CapabilityKind::Prompt,
                name: inv.name.clone(),
                source,
            })?;

        encode(&GetPromptResult {
            description: descriptor.description().to_string(),
            messages,
        })
    }
}

#[derive(Serialize)]
struct ToolsList {
    tools: Vec<ToolDefinition>,
}

#[derive(Serialize)]
struct PromptsList {
    prompts: Vec<PromptDefinition>,
}

fn encode<T: Serialize>(value: &T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialise result");
        DispatchError::Internal {
            message: "failed to serialise result".to_string(),
        }
    })
}
