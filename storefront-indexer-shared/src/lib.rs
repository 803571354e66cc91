//! # Storefront Indexer Shared
//!
//! This crate defines the data structures shared across the storefront indexer
//! ecosystem: versioned index names, the operator's persisted index selection,
//! field mappings, import cursors and the opaque documents that flow from upstream
//! sources into the search engine.

pub mod types;

pub use types::document::{document_id, Document};
pub use types::import_cursor::ImportCursor;
pub use types::index_version::{IndexVersion, SelectedIndexRecord};
pub use types::mapping::Mapping;
