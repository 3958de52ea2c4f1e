//! The document tools, resources and prompts.
//!
//! Tools read and edit documents, resources expose the document list and
//! individual documents, and prompts build instructions for a downstream
//! agent. Prompts never check that the document exists: the agent is told
//! to call the tools itself, and the document may not exist yet.

use serde_json::json;

use crate::documents::DocumentStore;
use crate::mcp::error::{HandlerError, RegistryError};
use crate::mcp::messages::PromptMessage;
use crate::mcp::registry::{CapabilityDescriptor, Registry, ResourceParams, ToolOutput};
use crate::mcp::schema::{Arguments, ParamSpec, ParamType};

/// Name of the read tool.
pub const READ_TOOL: &str = "read_doc_contents";
/// Name of the edit tool.
pub const EDIT_TOOL: &str = "edit_document";
/// URI of the document list resource.
pub const DOCUMENTS_URI: &str = "docs://documents";
/// URI template of a single document.
pub const DOCUMENT_TEMPLATE: &str = "docs://documents/{doc_id}";

/// Registers every document capability, in discovery order.
///
/// # Errors
///
/// Returns an error if any capability clashes with one already registered.
pub fn register_document_capabilities(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(CapabilityDescriptor::tool(
        READ_TOOL,
        "Read the contents of a document and return it as a string",
        vec![ParamSpec::required(
            "doc_id",
            ParamType::String,
            "The id of the document to read",
        )],
        read_document,
    ))?;

    registry.register(CapabilityDescriptor::tool(
        EDIT_TOOL,
        "Edit a document by replacing a string in documents content with another string",
        vec![
            ParamSpec::required("doc_id", ParamType::String, "Id of the document to be edited"),
            ParamSpec::required(
                "old_str",
                ParamType::String,
                "The text to replace. Must match exactly including the whitespaces",
            ),
            ParamSpec::required(
                "new_str",
                ParamType::String,
                "The new text to insert in place of the old text",
            ),
        ],
        edit_document,
    ))?;

    registry.register(CapabilityDescriptor::resource(
        DOCUMENTS_URI,
        "list_docs",
        "The ids of every available document",
        "application/json",
        list_documents,
    ))?;

    registry.register(CapabilityDescriptor::resource(
        DOCUMENT_TEMPLATE,
        "fetch_doc",
        "The contents of a single document",
        "text/plain",
        fetch_document,
    ))?;

    registry.register(CapabilityDescriptor::prompt(
        "format",
        "Rewrites the content of the document in Markdown format",
        vec![ParamSpec::required(
            "doc_id",
            ParamType::String,
            "Id of the document to format",
        )],
        format_prompt,
    ))?;

    registry.register(CapabilityDescriptor::prompt(
        "summarize",
        "Summarizes the content of the given document",
        vec![ParamSpec::required(
            "doc_id",
            ParamType::String,
            "Id of the document to summarize",
        )],
        summarize_prompt,
    ))?;

    Ok(())
}

/// Builds a registry holding only the document capabilities.
///
/// # Errors
///
/// Returns an error if registration fails.
pub fn document_registry() -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    register_document_capabilities(&mut registry)?;
    Ok(registry)
}

fn read_document(store: &mut dyn DocumentStore, args: &Arguments) -> Result<ToolOutput, HandlerError> {
    let doc_id = args.require_str("doc_id")?;
    Ok(ToolOutput::Text(store.get(doc_id)?.to_string()))
}

/// Replaces every occurrence of `old_str`. A missing `old_str` is a no-op.
fn edit_document(store: &mut dyn DocumentStore, args: &Arguments) -> Result<ToolOutput, HandlerError> {
    let doc_id = args.require_str("doc_id")?;
    let old_str = args.require_str("old_str")?;
    let new_str = args.require_str("new_str")?;

    let updated = store.get(doc_id)?.replace(old_str, new_str);
    store.set(doc_id, updated);
    tracing::debug!(doc_id, "document edited");

    Ok(ToolOutput::Empty)
}

fn list_documents(store: &dyn DocumentStore, _params: &ResourceParams) -> Result<String, HandlerError> {
    Ok(json!(store.keys()).to_string())
}

fn fetch_document(store: &dyn DocumentStore, params: &ResourceParams) -> Result<String, HandlerError> {
    let doc_id = params
        .get("doc_id")
        .ok_or_else(|| HandlerError::Failed("missing doc_id in resource URI".to_string()))?;
    Ok(store.get(doc_id)?.to_string())
}

fn format_prompt(args: &Arguments) -> Result<Vec<PromptMessage>, HandlerError> {
    let doc_id = args.require_str("doc_id")?;
    Ok(vec![PromptMessage::user(format!(
        "Your goal is to reformat a document to be written with markdown syntax.\n\
         \n\
         The id of the document you need to reformat is:\n\
         <document_id>\n\
         {doc_id}\n\
         </document_id>\n\
         \n\
         Add in headers, bullet points, tables, etc as necessary.\n\
         Use the '{EDIT_TOOL}' tool to edit the document.\n"
    ))])
}

fn summarize_prompt(args: &Arguments) -> Result<Vec<PromptMessage>, HandlerError> {
    let doc_id = args.require_str("doc_id")?;
    Ok(vec![PromptMessage::user(format!(
        "Summarize the provided document, focusing on the key points, arguments, and \
         conclusions. The summary should be concise and accurate.\n\
         The id of the document you need to summarize is:\n\
         <document_id>\n\
         {doc_id}\n\
         </document_id>\n\
         Use the '{READ_TOOL}' tool to read the document.\n"
    ))])
}
