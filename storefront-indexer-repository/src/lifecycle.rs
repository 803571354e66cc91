//! Index lifecycle: creating versions, applying mappings, deleting versions and
//! moving the public alias.

use std::sync::Arc;

use futures::future::join_all;
use storefront_indexer_shared::{IndexVersion, Mapping};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::catalog::IndexCatalog;
use crate::errors::{NotFoundReason, SearchIndexError};
use crate::interfaces::SearchIndexProvider;
use crate::mappings::MappingCatalog;
use crate::types::IndexCriterion;
use crate::utils::{cancellable, ensure_acknowledged};

/// Creates, maps, deletes and aliases index versions.
///
/// Alias moves are serialised by an internal lock, so two `set_alias` calls on the
/// same manager never interleave.
pub struct IndexLifecycleManager {
    catalog: Arc<IndexCatalog>,
    provider: Arc<dyn SearchIndexProvider>,
    mappings: MappingCatalog,
    alias_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl IndexLifecycleManager {
    pub fn new(
        catalog: Arc<IndexCatalog>,
        provider: Arc<dyn SearchIndexProvider>,
        mappings: MappingCatalog,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            provider,
            mappings,
            alias_lock: Mutex::new(()),
            cancel,
        }
    }

    pub fn catalog(&self) -> &Arc<IndexCatalog> {
        &self.catalog
    }

    pub fn mappings(&self) -> &MappingCatalog {
        &self.mappings
    }

    /// Create an empty index.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the engine acknowledged the creation
    /// * `Err(SearchIndexError::AcknowledgmentError)` - If it answered `acknowledged: false`
    #[instrument(skip(self))]
    pub async fn create_index(&self, name: &str) -> Result<(), SearchIndexError> {
        let ack = cancellable(&self.cancel, self.provider.create_index(name)).await?;
        ensure_acknowledged(ack, "create index", name)?;
        info!(index = %name, "Index created");
        Ok(())
    }

    /// Create the version after the latest one, or version 1 on an empty catalog.
    pub async fn create_next_index(&self) -> Result<IndexVersion, SearchIndexError> {
        let next_id = match self.catalog.latest().await {
            Ok(latest) => latest.id.checked_add(1).ok_or_else(|| {
                SearchIndexError::index(format!("no index id after '{}'", latest.name))
            })?,
            Err(SearchIndexError::NotFound(NotFoundReason::NoIndices)) => 1,
            Err(e) => return Err(e),
        };

        let version = IndexVersion::new(&self.catalog.config().prefix, next_id);
        self.create_index(&version.name).await?;
        Ok(version)
    }

    /// Apply every catalog mapping to `index`, one after another.
    ///
    /// On the first failure the index is deleted and the failure is returned. A
    /// failed cleanup is logged and does not replace the original error.
    #[instrument(skip(self))]
    pub async fn apply_mappings(&self, index: &str) -> Result<(), SearchIndexError> {
        for mapping in self.mappings.mappings() {
            if let Err(e) = self.put_mapping(index, mapping).await {
                error!(
                    index = %index,
                    document_type = %mapping.document_type,
                    error = %e,
                    "Mapping failed, deleting index"
                );
                self.discard_index(index).await;
                return Err(e);
            }
        }
        info!(index = %index, count = self.mappings.len(), "Mappings applied");
        Ok(())
    }

    /// `create_next_index` followed by `apply_mappings`.
    pub async fn create_next_index_and_apply_mappings(
        &self,
    ) -> Result<IndexVersion, SearchIndexError> {
        let version = self.create_next_index().await?;
        self.apply_mappings(&version.name).await?;
        Ok(version)
    }

    /// Add one document type's fields to `index`.
    ///
    /// A refused field-type change surfaces as `SearchIndexError::ImmutableMappingError`.
    pub async fn put_mapping(&self, index: &str, mapping: &Mapping) -> Result<(), SearchIndexError> {
        let ack = cancellable(&self.cancel, self.provider.put_mapping(index, mapping)).await?;
        ensure_acknowledged(ack, "put mapping", index)
    }

    /// Apply the whole catalog to an existing index, without rollback.
    #[instrument(skip(self))]
    pub async fn put_mappings(&self, index: &str) -> Result<(), SearchIndexError> {
        for mapping in self.mappings.mappings() {
            self.put_mapping(index, mapping).await?;
        }
        info!(index = %index, count = self.mappings.len(), "Mappings updated");
        Ok(())
    }

    /// Delete the index designated by `criterion`.
    #[instrument(skip(self))]
    pub async fn delete_index(&self, criterion: &IndexCriterion) -> Result<IndexVersion, SearchIndexError> {
        let version = self.catalog.resolve(criterion).await?;
        self.delete_by_name(&version.name).await?;
        Ok(version)
    }

    /// Delete every catalog entry, lowest id first.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Names of the deleted indices
    /// * `Err(SearchIndexError::PartialDeletion)` - On the first failure, listing what was
    ///   already deleted
    #[instrument(skip(self))]
    pub async fn delete_all_indices(&self) -> Result<Vec<String>, SearchIndexError> {
        let versions = self.catalog.list_indices().await?;
        let mut deleted = Vec::with_capacity(versions.len());

        for version in versions {
            if let Err(e) = self.delete_by_name(&version.name).await {
                error!(index = %version.name, deleted = ?deleted, error = %e, "Stopped deleting indices");
                return Err(SearchIndexError::PartialDeletion {
                    deleted,
                    failed_index: version.name,
                    source: Box::new(e),
                });
            }
            deleted.push(version.name);
        }

        info!(count = deleted.len(), "All indices deleted");
        Ok(deleted)
    }

    /// Point the public alias at `name`.
    ///
    /// Bindings held by other indices are removed while the new binding is made, so
    /// readers may briefly see zero or two bound indices. A binding that is already
    /// gone counts as removed. A failed binding wins over failed removals, which are
    /// reported only after every call has settled.
    #[instrument(skip(self))]
    pub async fn set_alias(&self, name: &str) -> Result<(), SearchIndexError> {
        let _guard = self.alias_lock.lock().await;
        cancellable(&self.cancel, self.move_alias(name)).await
    }

    async fn move_alias(&self, name: &str) -> Result<(), SearchIndexError> {
        let alias = self.catalog.config().alias.as_str();
        let current = self.provider.list_alias_bindings(alias).await?;

        let removals = current
            .iter()
            .filter(|bound| bound.as_str() != name)
            .map(|bound| async move {
                match self.provider.delete_alias(bound, alias).await {
                    Ok(ack) => ensure_acknowledged(ack, "delete alias", bound),
                    Err(SearchIndexError::NotFound(_)) => {
                        warn!(index = %bound, alias = %alias, "Alias binding already gone");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            });

        let (bound, removed) = tokio::join!(
            self.provider.put_alias(name, alias),
            join_all(removals)
        );

        ensure_acknowledged(bound?, "put alias", name)?;
        if let Some(e) = removed.into_iter().find_map(Result::err) {
            return Err(e);
        }

        info!(index = %name, alias = %alias, "Alias moved");
        Ok(())
    }

    async fn delete_by_name(&self, name: &str) -> Result<(), SearchIndexError> {
        let ack = cancellable(&self.cancel, self.provider.delete_index(name)).await?;
        ensure_acknowledged(ack, "delete index", name)?;
        info!(index = %name, "Index deleted");
        Ok(())
    }

    /// Best-effort removal of a half-built index.
    ///
    /// Runs outside the cancel token: a cancelled run must still clean up.
    pub(crate) async fn discard_index(&self, name: &str) {
        let deleted = match self.provider.delete_index(name).await {
            Ok(ack) => ensure_acknowledged(ack, "delete index", name),
            Err(e) => Err(e),
        };
        match deleted {
            Ok(()) => info!(index = %name, "Half-built index deleted"),
            Err(cleanup) => {
                error!(index = %name, error = %cleanup, "Failed to delete half-built index")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::mappings::mapping_from_value;
    use crate::memory::{EngineOperation, InMemorySearchEngine, InMemorySelectionRepository};
    use serde_json::json;
    use std::time::Duration;

    fn test_mappings() -> MappingCatalog {
        MappingCatalog::new(vec![
            mapping_from_value("product", json!({ "sku": { "type": "keyword" } })).unwrap(),
            mapping_from_value("category", json!({ "name": { "type": "text" } })).unwrap(),
            mapping_from_value("cms_page", json!({ "title": { "type": "text" } })).unwrap(),
        ])
    }

    fn manager_for(engine: Arc<InMemorySearchEngine>) -> IndexLifecycleManager {
        manager_with_cancel(engine, CancellationToken::new())
    }

    fn manager_with_cancel(
        engine: Arc<InMemorySearchEngine>,
        cancel: CancellationToken,
    ) -> IndexLifecycleManager {
        let catalog = Arc::new(IndexCatalog::new(
            engine.clone(),
            Arc::new(InMemorySelectionRepository::new()),
            IndexConfig::with_prefix_alias("shop"),
            cancel.clone(),
        ));
        IndexLifecycleManager::new(catalog, engine, test_mappings(), cancel)
    }

    #[tokio::test]
    async fn test_create_next_index_from_empty() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let manager = manager_for(engine.clone());

        let version = manager.create_next_index().await.unwrap();
        assert_eq!(version.name, "shop_1");
        assert!(engine.has_index("shop_1"));
    }

    #[tokio::test]
    async fn test_create_next_index_after_latest() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_2");
        engine.insert_index("shop_7");
        let manager = manager_for(engine);

        assert_eq!(manager.create_next_index().await.unwrap().id, 8);
    }

    #[tokio::test]
    async fn test_create_next_index_id_exhausted() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index(&format!("shop_{}", u64::MAX));
        let manager = manager_for(engine.clone());

        assert!(matches!(
            manager.create_next_index().await,
            Err(SearchIndexError::IndexError(_))
        ));
        assert_eq!(engine.index_names().len(), 1);
    }

    #[tokio::test]
    async fn test_create_index_not_acknowledged() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.reject(EngineOperation::CreateIndex, None);
        let manager = manager_for(engine);

        assert!(matches!(
            manager.create_index("shop_1").await,
            Err(SearchIndexError::AcknowledgmentError { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_mappings_rolls_back_on_failure() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.fail(
            EngineOperation::PutMapping,
            Some("category"),
            SearchIndexError::mapping("rejected"),
        );
        let manager = manager_for(engine.clone());

        let result = manager.create_next_index_and_apply_mappings().await;
        assert!(matches!(result, Err(SearchIndexError::MappingError(_))));
        assert!(engine.index_names().is_empty());

        // Sequential: the mapping after the failing one is never attempted.
        let ops = engine.operations();
        assert!(ops.contains(&"PutMapping product".to_string()));
        assert!(!ops.contains(&"PutMapping cms_page".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_mapping_run_deletes_index() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let cancel = CancellationToken::new();
        engine.cancel_on(EngineOperation::PutMapping, Some("category"), cancel.clone());
        let manager = manager_with_cancel(engine.clone(), cancel);

        let result = manager.create_next_index_and_apply_mappings().await;
        assert!(matches!(result, Err(SearchIndexError::Cancelled)));
        assert!(engine.index_names().is_empty());
        assert!(engine.operations().contains(&"DeleteIndex shop_1".to_string()));
        assert!(!engine.operations().contains(&"PutMapping cms_page".to_string()));
    }

    #[tokio::test]
    async fn test_failed_cleanup_keeps_original_error() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.fail(
            EngineOperation::PutMapping,
            Some("product"),
            SearchIndexError::mapping("rejected"),
        );
        engine.fail(
            EngineOperation::DeleteIndex,
            None,
            SearchIndexError::infrastructure("cluster read-only"),
        );
        let manager = manager_for(engine.clone());

        let result = manager.create_next_index_and_apply_mappings().await;
        assert!(matches!(result, Err(SearchIndexError::MappingError(_))));
        assert!(engine.has_index("shop_1"));
    }

    #[tokio::test]
    async fn test_put_mapping_type_change_is_immutable_error() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        let manager = manager_for(engine);
        manager.put_mappings("shop_1").await.unwrap();

        let changed = mapping_from_value("product", json!({ "sku": { "type": "long" } })).unwrap();
        let err = manager.put_mapping("shop_1", &changed).await.unwrap_err();
        assert!(matches!(err, SearchIndexError::ImmutableMappingError { .. }));
        assert!(err.to_string().contains("reindex"));
    }

    #[tokio::test]
    async fn test_put_mappings_keeps_index_on_failure() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.fail(
            EngineOperation::PutMapping,
            Some("category"),
            SearchIndexError::mapping("rejected"),
        );
        let manager = manager_for(engine.clone());

        assert!(manager.put_mappings("shop_1").await.is_err());
        assert!(engine.has_index("shop_1"));
    }

    #[tokio::test]
    async fn test_delete_index_by_criterion() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        let manager = manager_for(engine.clone());

        let deleted = manager.delete_index(&IndexCriterion::Latest).await.unwrap();
        assert_eq!(deleted.name, "shop_2");
        assert_eq!(engine.index_names(), vec!["shop_1"]);

        assert!(matches!(
            manager
                .delete_index(&IndexCriterion::Name("shop_9".to_string()))
                .await,
            Err(SearchIndexError::NotFound(NotFoundReason::IndexName(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_all_indices_ascending() {
        let engine = Arc::new(InMemorySearchEngine::new());
        for name in ["shop_10", "shop_2", "shop_1"] {
            engine.insert_index(name);
        }
        let manager = manager_for(engine.clone());

        let deleted = manager.delete_all_indices().await.unwrap();
        assert_eq!(deleted, vec!["shop_1", "shop_2", "shop_10"]);
        assert!(engine.index_names().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_indices_partial_failure() {
        let engine = Arc::new(InMemorySearchEngine::new());
        for name in ["shop_1", "shop_2", "shop_3"] {
            engine.insert_index(name);
        }
        engine.fail(
            EngineOperation::DeleteIndex,
            Some("shop_2"),
            SearchIndexError::infrastructure("timeout"),
        );
        let manager = manager_for(engine.clone());

        match manager.delete_all_indices().await {
            Err(SearchIndexError::PartialDeletion {
                deleted,
                failed_index,
                ..
            }) => {
                assert_eq!(deleted, vec!["shop_1"]);
                assert_eq!(failed_index, "shop_2");
            }
            other => panic!("expected partial deletion, got {:?}", other),
        }
        assert_eq!(engine.index_names(), vec!["shop_2", "shop_3"]);
    }

    #[tokio::test]
    async fn test_set_alias_then_resolve() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.insert_alias("shop_1", "shop");
        let manager = manager_for(engine.clone());

        manager.set_alias("shop_2").await.unwrap();

        let aliased = manager.catalog().resolve(&IndexCriterion::Aliased).await.unwrap();
        assert_eq!(aliased.name, "shop_2");
        assert_eq!(engine.bindings("shop"), vec!["shop_2"]);
    }

    #[tokio::test]
    async fn test_set_alias_to_current_target_keeps_binding() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.insert_alias("shop_1", "shop");
        let manager = manager_for(engine.clone());

        manager.set_alias("shop_1").await.unwrap();
        assert_eq!(engine.bindings("shop"), vec!["shop_1"]);
    }

    #[tokio::test]
    async fn test_set_alias_tolerates_vanished_binding() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.insert_alias("shop_1", "shop");
        engine.fail(
            EngineOperation::DeleteAlias,
            Some("shop_1"),
            SearchIndexError::not_found(NotFoundReason::AliasBinding {
                alias: "shop".to_string(),
                index: "shop_1".to_string(),
            }),
        );
        let manager = manager_for(engine);

        assert!(manager.set_alias("shop_2").await.is_ok());
    }

    #[tokio::test]
    async fn test_set_alias_reports_failed_removal() {
        let engine = Arc::new(InMemorySearchEngine::new());
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.insert_alias("shop_1", "shop");
        engine.fail(
            EngineOperation::DeleteAlias,
            Some("shop_1"),
            SearchIndexError::infrastructure("timeout"),
        );
        let manager = manager_for(engine.clone());

        assert!(matches!(
            manager.set_alias("shop_2").await,
            Err(SearchIndexError::InfrastructureError(_))
        ));
        // The new binding was still made.
        assert!(engine.bindings("shop").contains(&"shop_2".to_string()));
    }

    #[tokio::test]
    async fn test_set_alias_missing_target() {
        let engine = Arc::new(InMemorySearchEngine::new());
        let manager = manager_for(engine);
        assert!(matches!(
            manager.set_alias("shop_5").await,
            Err(SearchIndexError::NotFound(NotFoundReason::IndexName(_)))
        ));
    }

    #[tokio::test]
    async fn test_set_alias_overlap_window() {
        let engine = Arc::new(
            InMemorySearchEngine::new().with_alias_delete_delay(Duration::from_millis(20)),
        );
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.insert_alias("shop_1", "shop");
        let manager = manager_for(engine.clone());

        manager.set_alias("shop_2").await.unwrap();

        // The new binding lands before the old one is removed; once settled only
        // the target holds the alias.
        assert_eq!(engine.peak_bindings("shop"), 2);
        assert_eq!(engine.bindings("shop"), vec!["shop_2"]);
    }

    #[tokio::test]
    async fn test_concurrent_set_alias_calls_serialise() {
        let engine = Arc::new(
            InMemorySearchEngine::new().with_alias_delete_delay(Duration::from_millis(5)),
        );
        for name in ["shop_1", "shop_2", "shop_3"] {
            engine.insert_index(name);
        }
        engine.insert_alias("shop_1", "shop");
        let manager = Arc::new(manager_for(engine.clone()));

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.set_alias("shop_2").await })
        };
        let second = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.set_alias("shop_3").await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(engine.bindings("shop").len(), 1);
    }
}
