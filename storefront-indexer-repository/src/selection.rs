//! File-backed selection repository.
//!
//! The selection is a small JSON document, `{ "name": "...", "id": N }`, stored at a
//! configurable path (by default `var/selected-index.json`). It is read if present
//! and written only when the operator explicitly selects an index.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use storefront_indexer_shared::SelectedIndexRecord;
use tracing::{debug, info};

use crate::errors::SearchIndexError;
use crate::interfaces::SelectionRepository;

/// Default location of the selection file, relative to the working directory.
pub const DEFAULT_SELECTION_FILE: &str = "var/selected-index.json";

/// Stores the selection as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSelectionRepository {
    path: PathBuf,
}

impl FileSelectionRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SelectionRepository for FileSelectionRepository {
    async fn load(&self) -> Result<Option<SelectedIndexRecord>, SearchIndexError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No selection file");
                return Ok(None);
            }
            Err(e) => {
                return Err(SearchIndexError::selection_store(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let record = serde_json::from_str::<SelectedIndexRecord>(&contents).map_err(|e| {
            SearchIndexError::selection_store(format!(
                "Malformed selection file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(record))
    }

    async fn save(&self, record: &SelectedIndexRecord) -> Result<(), SearchIndexError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SearchIndexError::selection_store(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
        tokio::fs::write(&self.path, contents).await.map_err(|e| {
            SearchIndexError::selection_store(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(path = %self.path.display(), index = %record.name, "Selection saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_no_selection() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSelectionRepository::new(dir.path().join("selected-index.json"));
        assert_eq!(repository.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileSelectionRepository::new(dir.path().join("var/selected-index.json"));
        let record = SelectedIndexRecord {
            name: "shop_3".to_string(),
            id: 3,
        };

        repository.save(&record).await.unwrap();
        assert_eq!(repository.load().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected-index.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = FileSelectionRepository::new(path).load().await;
        assert!(matches!(result, Err(SearchIndexError::SelectionStoreError(_))));
    }
}
