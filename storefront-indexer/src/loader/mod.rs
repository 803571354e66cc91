//! Loader module for the import pipeline.
//!
//! Writes mapped records into the target index, one document per call.

use std::sync::Arc;

use async_trait::async_trait;
use storefront_indexer_repository::{SearchIndexError, SearchIndexProvider};
use storefront_indexer_shared::{document_id, Document};
use tracing::{debug, error, instrument};

/// Sink for mapped records.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    /// Write `record` of `entity_type` into `index`.
    async fn write(
        &self,
        index: &str,
        entity_type: &str,
        record: &Document,
    ) -> Result<(), SearchIndexError>;
}

/// Writes records through the search engine provider.
///
/// Records with an `id` get the deterministic id `<entity_type>_<id>`, so
/// re-importing a page overwrites instead of duplicating.
pub struct SearchLoader {
    provider: Arc<dyn SearchIndexProvider>,
}

impl SearchLoader {
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl DocumentWriter for SearchLoader {
    #[instrument(skip(self, record))]
    async fn write(
        &self,
        index: &str,
        entity_type: &str,
        record: &Document,
    ) -> Result<(), SearchIndexError> {
        let id = document_id(entity_type, record);
        match self.provider.index_document(index, id.as_deref(), record).await {
            Ok(()) => {
                debug!(document_id = ?id, "Record written");
                Ok(())
            }
            Err(e) => {
                error!(document_id = ?id, error = %e, "Failed to write record");
                Err(e)
            }
        }
    }
}
