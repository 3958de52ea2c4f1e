//! MCP method parameters and result payloads.
//!
//! These are the `params` and `result` bodies carried inside JSON-RPC
//! messages. Framing types live in [`crate::mcp::protocol`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mcp::protocol::SERVER_NAME;

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ListChangedCapability,
    /// Resource-related capabilities.
    pub resources: ResourceCapabilities,
    /// Prompt-related capabilities.
    pub prompts: ListChangedCapability,
}

/// Capability flag for lists that could change during a session.
///
/// The capability set is fixed at startup, so this is always `false`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ListChangedCapability {
    /// Whether the list can change during the session.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Resource-specific capabilities.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    /// Whether clients may subscribe to resource updates.
    pub subscribe: bool,
    /// Whether the resource list can change during the session.
    pub list_changed: bool,
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Result of the initialize request: identity, capabilities and discovery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Negotiated protocol version.
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identity.
    pub server_info: ServerInfo,
    /// Every registered tool.
    pub tools: Vec<ToolDefinition>,
    /// Every registered resource and resource template, in registration order.
    pub resources: Vec<ResourceEntry>,
    /// Every registered prompt.
    pub prompts: Vec<PromptDefinition>,
}

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// A fixed-URI resource for the resources/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// The resource URI.
    pub uri: String,
    /// Short display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the content.
    pub mime_type: String,
}

/// A templated resource for the resources/templates/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDefinition {
    /// The URI template, with a single `{param}` placeholder.
    pub uri_template: String,
    /// Short display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the content.
    pub mime_type: String,
}

/// Either kind of resource, for the combined discovery list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceEntry {
    /// A fixed-URI resource.
    Exact(ResourceDefinition),
    /// A resource template.
    Template(ResourceTemplateDefinition),
}

/// A prompt definition for the prompts/list response.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared prompt arguments.
    pub arguments: Vec<PromptArgument>,
}

/// A single declared prompt argument.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// Parameters for tools/call and prompts/get requests.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedCallParams {
    /// Name of the tool or prompt.
    pub name: String,
    /// Arguments, as supplied by the caller.
    #[serde(default)]
    pub arguments: Value,
}

/// Parameters for resources/read requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceReadParams {
    /// URI of the resource to read.
    pub uri: String,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Always `false`: failed calls are reported as error responses.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates a successful result with no content.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            content: Vec::new(),
            is_error: false,
        }
    }
}

/// Content of a resource read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// The URI that was read.
    pub uri: String,
    /// MIME type declared by the resource.
    pub mime_type: String,
    /// Textual content.
    pub text: String,
}

/// Result of resources/read.
#[derive(Debug, Clone, Serialize)]
pub struct ReadResourceResult {
    /// The resource contents (always exactly one entry).
    pub contents: Vec<ResourceContents>,
}

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
}

/// Content of a prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PromptContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// A role-tagged prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Who is speaking.
    pub role: Role,
    /// What is said.
    pub content: PromptContent,
}

impl PromptMessage {
    /// Creates a user-role text message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: PromptContent::Text { text: text.into() },
        }
    }

    /// Returns the message text.
    #[must_use]
    pub fn text(&self) -> &str {
        match &self.content {
            PromptContent::Text { text } => text,
        }
    }
}

/// Result of prompts/get.
#[derive(Debug, Clone, Serialize)]
pub struct GetPromptResult {
    /// Description of the prompt.
    pub description: String,
    /// The expanded messages, in order.
    pub messages: Vec<PromptMessage>,
}

/// Decodes optional request params into `T`, treating absent params as `{}`.
///
/// # Errors
///
/// Returns the deserialisation error message if the params do not match `T`.
pub fn decode_params<T: DeserializeOwned>(params: Option<&Value>) -> Result<T, String> {
    let value = params
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    serde_json::from_value(value).map_err(|e| e.to_string())
}
