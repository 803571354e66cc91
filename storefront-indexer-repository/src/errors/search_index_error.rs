//! Search index error types.
//!
//! This module defines the unified error type for all index catalog and lifecycle
//! operations, including both low-level engine errors and high-level application errors.

use thiserror::Error;

/// Why a lookup produced no index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundReason {
    /// The catalog holds no index for the configured prefix.
    #[error("no indices exist for the configured prefix")]
    NoIndices,

    /// No index is bound to the public alias.
    #[error("no index holds alias '{alias}'")]
    NoAlias { alias: String },

    /// The operator has never selected an index.
    #[error("no index has been selected")]
    NoSelection,

    /// The persisted selection refers to an index that was deleted since.
    #[error("selected index no longer exists: {name}")]
    SelectionStale { name: String },

    /// No index with this name.
    #[error("index '{0}' does not exist")]
    IndexName(String),

    /// No index with this numeric id.
    #[error("index with id {0} does not exist")]
    IndexId(u64),

    /// The alias is not bound to this index.
    #[error("alias '{alias}' is not bound to index '{index}'")]
    AliasBinding { alias: String, index: String },

    /// The engine does not know this task.
    #[error("task '{0}' does not exist")]
    Task(String),
}

/// Unified errors from search index operations.
///
/// Used by the `SearchIndexProvider` trait and by the catalog, lifecycle and reindex
/// services. Includes both low-level engine errors (transport, parsing, etc.) and
/// high-level application errors (missing index, alias invariant, etc.).
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The engine could not be reached or returned an unexpected failure.
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),

    /// The requested index, alias or selection does not exist.
    #[error("Not found: {0}")]
    NotFound(NotFoundReason),

    /// The engine answered a mutating call with `acknowledged: false`.
    #[error("Acknowledgment error: {operation} on '{target}' was not acknowledged")]
    AcknowledgmentError { operation: String, target: String },

    /// The engine refused to change the type of an existing field.
    #[error(
        "Immutable mapping error: cannot update '{document_type}' mapping of '{index}' ({reason}). \
         Only adding fields or upgrading a field to multi-field is allowed; use reindex instead"
    )]
    ImmutableMappingError {
        index: String,
        document_type: String,
        reason: String,
    },

    /// A mapping was rejected or could not be loaded.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// More than one index holds the public alias.
    #[error("Alias invariant violation: alias '{alias}' is bound to {indices:?}")]
    AliasInvariantViolation { alias: String, indices: Vec<String> },

    /// `delete_all_indices` stopped part-way.
    #[error("Partial deletion: deleted {deleted:?} before failing on '{failed_index}': {source}")]
    PartialDeletion {
        deleted: Vec<String>,
        failed_index: String,
        source: Box<SearchIndexError>,
    },

    /// Failed to write a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to parse a response from the engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The selection store could not be read or written.
    #[error("Selection store error: {0}")]
    SelectionStoreError(String),

    /// The operation was cancelled before it settled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SearchIndexError {
    /// Create an infrastructure error.
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::InfrastructureError(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(reason: NotFoundReason) -> Self {
        Self::NotFound(reason)
    }

    /// Create an acknowledgment error.
    pub fn not_acknowledged(operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self::AcknowledgmentError {
            operation: operation.into(),
            target: target.into(),
        }
    }

    /// Create an immutable mapping error.
    pub fn immutable_mapping(
        index: impl Into<String>,
        document_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ImmutableMappingError {
            index: index.into(),
            document_type: document_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a mapping error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingError(msg.into())
    }

    /// Create an index (document write) error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a selection store error.
    pub fn selection_store(msg: impl Into<String>) -> Self {
        Self::SelectionStoreError(msg.into())
    }

    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
