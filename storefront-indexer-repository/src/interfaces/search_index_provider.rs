//! Search index provider trait definition.
//!
//! This module defines the abstract interface to the search engine, allowing for
//! different backend implementations (OpenSearch, Elasticsearch, in-memory, etc.).

use async_trait::async_trait;
use storefront_indexer_shared::{Document, Mapping};

use crate::errors::SearchIndexError;
use crate::types::{Acknowledgment, IndexListing, ReindexTask, TaskStatus};

/// Abstracts the underlying search engine (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the catalog, lifecycle and reindex services and
/// into the import pipeline, which enables easy testing with in-memory engines.
///
/// Implementations map engine answers onto `SearchIndexError` consistently:
///
/// * a missing index, alias binding or task is `SearchIndexError::NotFound`
/// * a refused field-type change is `SearchIndexError::ImmutableMappingError`
/// * transport failures are `SearchIndexError::InfrastructureError`
///
/// Mutating calls return the engine's `Acknowledgment` unchanged; callers decide
/// whether `acknowledged: false` is an error.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// List indices whose names match `pattern` (e.g. `shop_*`).
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<IndexListing>)` - Matching indices in engine order, possibly empty
    /// * `Err(SearchIndexError)` - If the engine is unreachable
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexListing>, SearchIndexError>;

    /// Names of every index currently bound to `alias`. Empty if the alias is unbound.
    async fn list_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError>;

    /// Create an empty index.
    async fn create_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError>;

    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(Acknowledgment)` - The engine's answer
    /// * `Err(SearchIndexError::NotFound)` - If the index does not exist
    async fn delete_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError>;

    /// Add the fields of `mapping` to an existing index.
    ///
    /// # Arguments
    ///
    /// * `index` - The target index name
    /// * `mapping` - The document type's field definitions
    ///
    /// # Returns
    ///
    /// * `Ok(Acknowledgment)` - The engine's answer
    /// * `Err(SearchIndexError::ImmutableMappingError)` - If an existing field would change type
    async fn put_mapping(
        &self,
        index: &str,
        mapping: &Mapping,
    ) -> Result<Acknowledgment, SearchIndexError>;

    /// Bind `alias` to `index`.
    async fn put_alias(&self, index: &str, alias: &str) -> Result<Acknowledgment, SearchIndexError>;

    /// Remove the binding of `alias` from `index`.
    ///
    /// Returns `SearchIndexError::NotFound` when the binding does not exist.
    async fn delete_alias(
        &self,
        index: &str,
        alias: &str,
    ) -> Result<Acknowledgment, SearchIndexError>;

    /// Start copying every document of `source` into `destination` in the background.
    ///
    /// Returns as soon as the engine accepted the copy; completion is observed through
    /// `task_status`.
    async fn reindex(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<ReindexTask, SearchIndexError>;

    /// Poll a background task.
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SearchIndexError>;

    /// Write one document, replacing any document with the same id.
    ///
    /// # Arguments
    ///
    /// * `index` - The target index name
    /// * `id` - Document id; `None` lets the engine assign one
    /// * `document` - The document body
    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Document,
    ) -> Result<(), SearchIndexError>;
}
