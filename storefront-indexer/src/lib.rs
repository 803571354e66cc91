//! # Storefront Indexer
//!
//! Manages the versioned search indices behind the storefront and imports
//! documents into them from the commerce backend and the headless CMS.
//!
//! ## Architecture
//!
//! Index management lives in `storefront-indexer-repository`; this crate adds the
//! import pipeline and the operator CLI:
//!
//! 1. **Source**: fetches one page of documents from an upstream system
//! 2. **Processor**: maps each document to zero or more records
//! 3. **Loader**: writes records into the target index
//! 4. **Importer**: drives the page loop
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`processor`]: Record mappers
//! - [`loader`]: Writes records into the search engine
//! - [`importer`]: Page loop and write concurrency
//! - [`cli`]: Command line definition
//! - [`commands`]: Command execution
//! - [`errors`]: Error types for the import pipeline

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod importer;
pub mod loader;
pub mod processor;

pub use config::{AppConfig, Dependencies};
pub use errors::{ImportError, MapError};
pub use importer::{ImportOptions, ImportReport, Importer};

use storefront_indexer_repository::{ReindexError, ReindexStage, SearchIndexError};
use storefront_sources::SourceError;
use thiserror::Error;

/// Exit status when the requested index cannot be resolved.
pub const EXIT_INDEX_NOT_RESOLVED: u8 = 126;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The index the operator designated does not exist.
    #[error("Index not resolved: {0}")]
    IndexNotResolved(SearchIndexError),

    /// Search engine or index lifecycle error.
    #[error("Index error: {0}")]
    IndexError(#[from] SearchIndexError),

    /// Reindex error.
    #[error(transparent)]
    ReindexError(#[from] ReindexError),

    /// Import error.
    #[error("Import error: {0}")]
    ImportError(#[from] ImportError),

    /// Document source error outside an import, e.g. while authenticating.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Classify an index lookup failure: a missing index is a resolution failure.
    pub fn resolution(error: SearchIndexError) -> Self {
        if error.is_not_found() {
            Self::IndexNotResolved(error)
        } else {
            Self::IndexError(error)
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::IndexNotResolved(_) => EXIT_INDEX_NOT_RESOLVED,
            Self::ReindexError(e) if e.stage == ReindexStage::Start && e.source.is_not_found() => {
                EXIT_INDEX_NOT_RESOLVED
            }
            _ => 1,
        }
    }
}
