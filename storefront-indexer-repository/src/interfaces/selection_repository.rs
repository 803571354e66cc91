//! Persistence of the operator's selected index.

use async_trait::async_trait;
use storefront_indexer_shared::SelectedIndexRecord;

use crate::errors::SearchIndexError;

/// Stores the operator's `SelectedIndexRecord`.
///
/// The record is not validated against the engine; it may outlive the index it names.
#[async_trait]
pub trait SelectionRepository: Send + Sync {
    /// Read the current selection, `None` if nothing was ever selected.
    async fn load(&self) -> Result<Option<SelectedIndexRecord>, SearchIndexError>;

    /// Replace the current selection.
    async fn save(&self, record: &SelectedIndexRecord) -> Result<(), SearchIndexError>;
}
