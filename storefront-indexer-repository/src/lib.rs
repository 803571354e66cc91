//! # Storefront Indexer Repository
//!
//! This crate owns everything that talks to the search engine: the
//! `SearchIndexProvider` boundary with its OpenSearch and in-memory
//! implementations, the mapping catalog, the persisted index selection, and the
//! three services built on top of them:
//!
//! - [`IndexCatalog`] lists versions and resolves an [`IndexCriterion`]
//! - [`IndexLifecycleManager`] creates, maps, deletes and aliases versions
//! - [`ReindexOrchestrator`] copies the current version into a new one

pub mod catalog;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod lifecycle;
pub mod mappings;
pub mod memory;
pub mod opensearch;
pub mod reindex;
pub mod selection;
pub mod types;
pub mod utils;

pub use catalog::{CatalogSnapshot, IndexCatalog};
pub use config::IndexConfig;
pub use errors::{NotFoundReason, ReindexError, ReindexStage, SearchIndexError};
pub use interfaces::{SearchIndexProvider, SelectionRepository};
pub use lifecycle::IndexLifecycleManager;
pub use mappings::MappingCatalog;
pub use opensearch::OpenSearchProvider;
pub use reindex::{ReindexOrchestrator, ReindexOutcome};
pub use selection::{FileSelectionRepository, DEFAULT_SELECTION_FILE};
pub use types::{Acknowledgment, IndexCriterion, IndexListing, ReindexTask, TaskStatus};
