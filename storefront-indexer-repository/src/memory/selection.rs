//! In-memory selection repository.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use storefront_indexer_shared::SelectedIndexRecord;

use crate::errors::SearchIndexError;
use crate::interfaces::SelectionRepository;

/// Keeps the selection in process memory.
#[derive(Debug, Default)]
pub struct InMemorySelectionRepository {
    record: Mutex<Option<SelectedIndexRecord>>,
}

impl InMemorySelectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `record` already selected.
    pub fn with_record(record: SelectedIndexRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

#[async_trait]
impl SelectionRepository for InMemorySelectionRepository {
    async fn load(&self) -> Result<Option<SelectedIndexRecord>, SearchIndexError> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, record: &SelectedIndexRecord) -> Result<(), SearchIndexError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }
}
