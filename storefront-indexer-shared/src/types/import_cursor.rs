//! Pagination cursor for one importer run.

use serde::{Deserialize, Serialize};

/// Position of an import within an upstream collection.
///
/// Cursors are transient: they live for the duration of one importer invocation
/// and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCursor {
    pub entity_type: String,
    pub page: u32,
    pub page_size: u32,
}

impl ImportCursor {
    pub fn new(entity_type: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            page,
            page_size,
        }
    }

    /// The cursor for the following page.
    pub fn next_page(&self) -> Self {
        Self {
            entity_type: self.entity_type.clone(),
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}
