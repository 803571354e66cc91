//! Error types for the import pipeline.

use storefront_indexer_repository::SearchIndexError;
use storefront_sources::SourceError;
use thiserror::Error;

/// A record mapper rejected a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MapError(pub String);

impl MapError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors that can occur while importing one entity type.
#[derive(Error, Debug, Clone)]
pub enum ImportError {
    /// The upstream page could not be fetched.
    #[error("Source error on page {page} of {entity_type}: {source}")]
    Source {
        entity_type: String,
        page: u32,
        #[source]
        source: SourceError,
    },

    /// A document could not be turned into records.
    #[error("Mapper error on page {page} of {entity_type}: {source}")]
    Mapper {
        entity_type: String,
        page: u32,
        #[source]
        source: MapError,
    },

    /// A record could not be written.
    #[error("Write error on page {page} of {entity_type} (document {document_id:?}): {source}")]
    Write {
        entity_type: String,
        page: u32,
        document_id: Option<String>,
        #[source]
        source: SearchIndexError,
    },

    /// Some records of a concurrently imported page failed; all of them settled.
    #[error(
        "Page {page} of {entity_type} failed: {failed} of {attempted} records failed, first: {first_error}"
    )]
    PageFailed {
        entity_type: String,
        page: u32,
        failed: usize,
        attempted: usize,
        first_error: Box<ImportError>,
    },

    #[error("Import cancelled")]
    Cancelled,
}

impl ImportError {
    /// Create a source error, keeping cancellation distinct.
    pub fn fetch(entity_type: impl Into<String>, page: u32, source: SourceError) -> Self {
        match source {
            SourceError::Cancelled => Self::Cancelled,
            source => Self::Source {
                entity_type: entity_type.into(),
                page,
                source,
            },
        }
    }

    /// Create a mapper error.
    pub fn mapper(entity_type: impl Into<String>, page: u32, source: MapError) -> Self {
        Self::Mapper {
            entity_type: entity_type.into(),
            page,
            source,
        }
    }

    /// Create a write error, keeping cancellation distinct.
    pub fn write(
        entity_type: impl Into<String>,
        page: u32,
        document_id: Option<String>,
        source: SearchIndexError,
    ) -> Self {
        match source {
            SearchIndexError::Cancelled => Self::Cancelled,
            source => Self::Write {
                entity_type: entity_type.into(),
                page,
                document_id,
                source,
            },
        }
    }
}
