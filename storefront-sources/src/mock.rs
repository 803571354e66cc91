//! Mock document source for testing and local development.
//!
//! The `MockDocumentSource` is pre-populated with pages per entity type and records
//! every cursor it is asked for, allowing importer tests to run without network
//! access and to assert on the exact fetch sequence.
//!
//! # Example
//!
//! ```ignore
//! use storefront_sources::{DocumentSource, MockDocumentSource};
//!
//! let source = MockDocumentSource::new();
//! source.register_pages("category", vec![page_0, page_1]);
//! let documents = source.get_documents(&ImportCursor::new("category", 1, 25)).await?;
//! assert_eq!(source.call_count(), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use storefront_indexer_shared::{Document, ImportCursor};

use crate::{DocumentSource, Result, SourceError};

/// Mock source that serves pre-registered pages.
///
/// Unregistered pages are empty, which ends an import.
pub struct MockDocumentSource {
    /// (entity type, page) -> documents
    pages: Mutex<HashMap<(String, u32), Vec<Document>>>,
    /// Errors returned, in order, by the next calls.
    failures: Mutex<VecDeque<SourceError>>,
    calls: Mutex<Vec<ImportCursor>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockDocumentSource {
    /// Create a new empty mock source.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register consecutive pages for `entity_type`, the first one at page 0.
    pub fn register_pages(&self, entity_type: &str, pages: Vec<Vec<Document>>) {
        for (page, documents) in pages.into_iter().enumerate() {
            self.register_page(entity_type, page as u32, documents);
        }
    }

    pub fn register_page(&self, entity_type: &str, page: u32, documents: Vec<Document>) {
        locked(&self.pages).insert((entity_type.to_string(), page), documents);
    }

    /// Make the next call fail with `error`. Queued errors are consumed in order.
    pub fn fail_next(&self, error: SourceError) {
        locked(&self.failures).push_back(error);
    }

    /// Every cursor requested so far, failed calls included.
    pub fn calls(&self) -> Vec<ImportCursor> {
        locked(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        locked(&self.calls).len()
    }
}

impl Default for MockDocumentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn get_documents(&self, cursor: &ImportCursor) -> Result<Vec<Document>> {
        locked(&self.calls).push(cursor.clone());

        if let Some(error) = locked(&self.failures).pop_front() {
            return Err(error);
        }

        Ok(locked(&self.pages)
            .get(&(cursor.entity_type.clone(), cursor.page))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
