//! Error types for the storefront indexer repository.
//!
//! `SearchIndexError` covers every engine, catalog and lifecycle operation;
//! `ReindexError` adds the stage a reindex run reached before failing.

mod reindex_error;
mod search_index_error;

pub use reindex_error::{ReindexError, ReindexStage};
pub use search_index_error::{NotFoundReason, SearchIndexError};
