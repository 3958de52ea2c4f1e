//! Capability registry.
//!
//! Holds every tool, resource, resource template and prompt the server
//! offers, together with the handler bound to it. Descriptors are created
//! once at startup and never change afterwards. Listing always follows
//! registration order so discovery output is stable across runs.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::documents::DocumentStore;
use crate::mcp::error::{HandlerError, RegistryError};
use crate::mcp::messages::{
    PromptArgument, PromptDefinition, PromptMessage, ResourceDefinition, ResourceEntry,
    ResourceTemplateDefinition, ToolDefinition,
};
use crate::mcp::schema::{input_schema, Arguments, ParamSpec};

/// Placeholder values extracted from a resource URI.
pub type ResourceParams = IndexMap<String, String>;

/// Handler bound to a tool. Tools may mutate the document store.
pub type ToolHandler =
    Box<dyn Fn(&mut dyn DocumentStore, &Arguments) -> Result<ToolOutput, HandlerError> + Send + Sync>;

/// Handler bound to a resource or resource template. Resources are read-only.
pub type ResourceHandler =
    Box<dyn Fn(&dyn DocumentStore, &ResourceParams) -> Result<String, HandlerError> + Send + Sync>;

/// Handler bound to a prompt. Prompts are pure template expansion.
pub type PromptHandler =
    Box<dyn Fn(&Arguments) -> Result<Vec<PromptMessage>, HandlerError> + Send + Sync>;

/// What a tool handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// Structured data, sent to the caller as JSON text.
    Structured(Value),
    /// Nothing to report.
    Empty,
}

/// The kind of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// An invokable operation.
    Tool,
    /// A resource with a fixed URI.
    Resource,
    /// A resource addressed through a URI template.
    ResourcePattern,
    /// A message template.
    Prompt,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::ResourcePattern => "resource template",
            Self::Prompt => "prompt",
        })
    }
}

enum Handler {
    Tool(ToolHandler),
    Resource(ResourceHandler),
    Prompt(PromptHandler),
}

/// Declarative metadata for a capability, plus its bound handler.
pub struct CapabilityDescriptor {
    kind: CapabilityKind,
    name: String,
    title: String,
    description: String,
    mime_type: Option<String>,
    params: Vec<ParamSpec>,
    handler: Handler,
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("mime_type", &self.mime_type)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl CapabilityDescriptor {
    /// Declares a tool.
    pub fn tool<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut dyn DocumentStore, &Arguments) -> Result<ToolOutput, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        Self {
            kind: CapabilityKind::Tool,
            title: name.clone(),
            name,
            description: description.into(),
            mime_type: None,
            params,
            handler: Handler::Tool(Box::new(handler)),
        }
    }

    /// Declares a resource.
    ///
    /// A URI containing a `{param}` placeholder declares a resource template;
    /// the placeholder is checked when the descriptor is registered.
    pub fn resource<F>(
        uri: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        mime_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(&dyn DocumentStore, &ResourceParams) -> Result<String, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let uri = uri.into();
        let kind = if uri.contains('{') || uri.contains('}') {
            CapabilityKind::ResourcePattern
        } else {
            CapabilityKind::Resource
        };
        Self {
            kind,
            name: uri,
            title: title.into(),
            description: description.into(),
            mime_type: Some(mime_type.into()),
            params: Vec::new(),
            handler: Handler::Resource(Box::new(handler)),
        }
    }

    /// Declares a prompt.
    pub fn prompt<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Self
    where
        F: Fn(&Arguments) -> Result<Vec<PromptMessage>, HandlerError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            kind: CapabilityKind::Prompt,
            title: name.clone(),
            name,
            description: description.into(),
            mime_type: None,
            params,
            handler: Handler::Prompt(Box::new(handler)),
        }
    }

    /// The capability kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Tool or prompt name, or the resource URI / URI template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description shown to callers during discovery.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared MIME type (resources only).
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Declared parameters, in order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Runs the bound tool handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure, or fails if this is not a tool.
    pub fn invoke_tool(
        &self,
        store: &mut dyn DocumentStore,
        args: &Arguments,
    ) -> Result<ToolOutput, HandlerError> {
        match &self.handler {
            Handler::Tool(handler) => handler(store, args),
            _ => Err(self.wrong_kind()),
        }
    }

    /// Runs the bound resource handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure, or fails if this is not a resource.
    pub fn invoke_resource(
        &self,
        store: &dyn DocumentStore,
        params: &ResourceParams,
    ) -> Result<String, HandlerError> {
        match &self.handler {
            Handler::Resource(handler) => handler(store, params),
            _ => Err(self.wrong_kind()),
        }
    }

    /// Runs the bound prompt handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure, or fails if this is not a prompt.
    pub fn invoke_prompt(&self, args: &Arguments) -> Result<Vec<PromptMessage>, HandlerError> {
        match &self.handler {
            Handler::Prompt(handler) => handler(args),
            _ => Err(self.wrong_kind()),
        }
    }

    fn wrong_kind(&self) -> HandlerError {
        HandlerError::Failed(format!("{} is a {}", self.name, self.kind))
    }

    /// Discovery entry for a tool.
    #[must_use]
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: input_schema(&self.params),
        }
    }

    /// Discovery entry for a resource or resource template.
    #[must_use]
    pub fn resource_entry(&self) -> ResourceEntry {
        let mime_type = self.mime_type.clone().unwrap_or_default();
        if self.kind == CapabilityKind::ResourcePattern {
            ResourceEntry::Template(ResourceTemplateDefinition {
                uri_template: self.name.clone(),
                name: self.title.clone(),
                description: self.description.clone(),
                mime_type,
            })
        } else {
            ResourceEntry::Exact(ResourceDefinition {
                uri: self.name.clone(),
                name: self.title.clone(),
                description: self.description.clone(),
                mime_type,
            })
        }
    }

    /// Discovery entry for a prompt.
    #[must_use]
    pub fn prompt_definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self
                .params
                .iter()
                .map(|p| PromptArgument {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    required: p.required,
                })
                .collect(),
        }
    }
}

/// Name and description of a capability, for discovery listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySummary {
    /// Name or URI.
    pub name: String,
    /// Description.
    pub description: String,
}

/// A parsed URI template with exactly one `{param}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    prefix: String,
    param: String,
    suffix: String,
}

impl UriTemplate {
    /// Parses a template such as `docs://documents/{doc_id}`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidTemplate`] unless the template holds
    /// exactly one non-empty placeholder.
    pub fn parse(template: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let open = template.find('{').ok_or_else(|| invalid("no placeholder"))?;
        let close = template[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| invalid("unterminated placeholder"))?;

        let prefix = &template[..open];
        let param = &template[open + 1..close];
        let suffix = &template[close + 1..];

        if param.is_empty() {
            return Err(invalid("empty placeholder name"));
        }
        if [prefix, param, suffix]
            .iter()
            .any(|part| part.contains('{') || part.contains('}'))
        {
            return Err(invalid("only a single placeholder is supported"));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            param: param.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Name of the placeholder.
    #[must_use]
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Length of the literal parts; longer means more specific.
    fn literal_len(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }

    /// Matches a URI, returning the value bound to the placeholder.
    ///
    /// The bound segment must be non-empty and must not contain `/`.
    #[must_use]
    pub fn matches(&self, uri: &str) -> Option<String> {
        let rest = uri.strip_prefix(self.prefix.as_str())?;
        let value = rest.strip_suffix(self.suffix.as_str())?;
        if value.is_empty() || value.contains('/') {
            return None;
        }
        Some(value.to_string())
    }
}

/// The set of capabilities offered by the server.
#[derive(Default)]
pub struct Registry {
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<(CapabilityKind, String), usize>,
    templates: Vec<(UriTemplate, usize)>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.descriptors).finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCapability`] if a capability of the
    /// same kind and name exists, or [`RegistryError::InvalidTemplate`] if a
    /// resource template cannot be parsed.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), RegistryError> {
        let key = (descriptor.kind, descriptor.name.clone());
        if self.index.contains_key(&key) {
            return Err(RegistryError::DuplicateCapability {
                kind: descriptor.kind,
                name: descriptor.name,
            });
        }

        let position = self.descriptors.len();
        if descriptor.kind == CapabilityKind::ResourcePattern {
            let template = UriTemplate::parse(&descriptor.name)?;
            self.templates.push((template, position));
        }

        tracing::debug!(kind = %descriptor.kind, name = %descriptor.name, "registered capability");
        self.index.insert(key, position);
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Looks up a capability by kind and exact name.
    #[must_use]
    pub fn lookup_exact(&self, kind: CapabilityKind, name: &str) -> Option<&CapabilityDescriptor> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&i| &self.descriptors[i])
    }

    /// Resolves a resource URI.
    ///
    /// Exact resources win. Otherwise the most specific matching template is
    /// used (longest literal text, then registration order) and its
    /// placeholder is bound to the matching URI segment.
    #[must_use]
    pub fn lookup_resource(&self, uri: &str) -> Option<(&CapabilityDescriptor, ResourceParams)> {
        if let Some(descriptor) = self.lookup_exact(CapabilityKind::Resource, uri) {
            return Some((descriptor, ResourceParams::new()));
        }

        let mut best: Option<(&UriTemplate, usize, String)> = None;
        for (template, position) in &self.templates {
            let Some(value) = template.matches(uri) else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |(current, _, _)| template.literal_len() > current.literal_len())
            {
                best = Some((template, *position, value));
            }
        }

        best.map(|(template, position, value)| {
            let mut params = ResourceParams::new();
            params.insert(template.param().to_string(), value);
            (&self.descriptors[position], params)
        })
    }

    /// Iterates the capabilities of a kind, in registration order.
    pub fn iter(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    /// Iterates resources and resource templates, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.iter().filter(|d| {
            matches!(
                d.kind,
                CapabilityKind::Resource | CapabilityKind::ResourcePattern
            )
        })
    }

    /// Name and description of every capability of a kind.
    #[must_use]
    pub fn list_all(&self, kind: CapabilityKind) -> Vec<CapabilitySummary> {
        self.iter(kind)
            .map(|d| CapabilitySummary {
                name: d.name.clone(),
                description: d.description.clone(),
            })
            .collect()
    }

    /// Total number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
