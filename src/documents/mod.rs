//! Document store and the document capability set.
//!
//! The dispatch layer only talks to documents through the [`DocumentStore`]
//! trait. [`MemoryStore`] is the in-process implementation used by the
//! server binary; it keeps documents in insertion order.

pub mod capabilities;

pub use capabilities::{document_registry, register_document_capabilities};

use indexmap::IndexMap;
use thiserror::Error;

/// Documents the server starts with when no configuration overrides them.
pub const SEED_DOCUMENTS: &[(&str, &str)] = &[
    (
        "deposition.md",
        "This deposition covers the testimony of Angela Smith, P.E.",
    ),
    (
        "report.pdf",
        "The report details the state of a 20m condenser tower.",
    ),
    (
        "financials.docx",
        "These financials outline the project's budget and expenditures.",
    ),
    (
        "outlook.pdf",
        "This document presents the projected future performance of the system.",
    ),
    (
        "plan.md",
        "The plan outlines the steps for the project's implementation.",
    ),
    (
        "spec.txt",
        "These specifications define the technical requirements for the equipment.",
    ),
];

/// Errors returned by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// No document exists under the identifier.
    #[error("Doc with id {id} not found")]
    NotFound {
        /// The requested identifier.
        id: String,
    },
}

/// Storage backend for documents, keyed by identifier.
pub trait DocumentStore {
    /// Returns the content of a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if no such document exists.
    fn get(&self, id: &str) -> Result<&str, DocumentError>;

    /// Creates or replaces a document.
    fn set(&mut self, id: &str, content: String);

    /// Returns every document identifier, in insertion order.
    fn keys(&self) -> Vec<String>;
}

/// An in-memory document store that preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    documents: IndexMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the [`SEED_DOCUMENTS`].
    #[must_use]
    pub fn seeded() -> Self {
        SEED_DOCUMENTS
            .iter()
            .map(|(id, content)| ((*id).to_string(), (*content).to_string()))
            .collect()
    }

    /// Number of documents in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl From<IndexMap<String, String>> for MemoryStore {
    fn from(documents: IndexMap<String, String>) -> Self {
        Self { documents }
    }
}

impl FromIterator<(String, String)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            documents: iter.into_iter().collect(),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, id: &str) -> Result<&str, DocumentError> {
        self.documents
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| DocumentError::NotFound { id: id.to_string() })
    }

    fn set(&mut self, id: &str, content: String) {
        // Replacing keeps the original position; only new ids go to the end.
        self.documents.insert(id.to_string(), content);
    }

    fn keys(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }
}
