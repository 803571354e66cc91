//! Property tests for the catalog's versioning and the alias single-ownership rule.
//!
//! Run with: `cargo test -p storefront-indexer-repository --test catalog_properties`

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use storefront_indexer_repository::mappings::mapping_from_value;
use storefront_indexer_repository::memory::{InMemorySearchEngine, InMemorySelectionRepository};
use storefront_indexer_repository::{
    IndexCatalog, IndexConfig, IndexCriterion, IndexLifecycleManager, MappingCatalog,
    NotFoundReason, SearchIndexError,
};
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn services(engine: Arc<InMemorySearchEngine>) -> (Arc<IndexCatalog>, IndexLifecycleManager) {
    let cancel = CancellationToken::new();
    let catalog = Arc::new(IndexCatalog::new(
        engine.clone(),
        Arc::new(InMemorySelectionRepository::new()),
        IndexConfig::with_prefix_alias("shop"),
        cancel.clone(),
    ));
    let mappings = MappingCatalog::new(vec![mapping_from_value(
        "product",
        json!({ "sku": { "type": "keyword" } }),
    )
    .unwrap()]);
    let lifecycle = IndexLifecycleManager::new(catalog.clone(), engine, mappings, cancel);
    (catalog, lifecycle)
}

proptest! {
    #[test]
    fn latest_is_max_id(ids in prop::collection::btree_set(1u64..10_000, 1..20)) {
        let engine = Arc::new(InMemorySearchEngine::new());
        for id in &ids {
            engine.insert_index(&format!("shop_{}", id));
        }
        // Noise that shares the prefix but is outside the version scheme.
        engine.insert_index("shop_backup");

        let (catalog, lifecycle) = services(engine);
        let rt = runtime();

        let latest = rt.block_on(catalog.latest()).unwrap();
        let max = *ids.iter().max().unwrap();
        prop_assert_eq!(latest.id, max);

        let listed: Vec<u64> = rt
            .block_on(catalog.list_indices())
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        prop_assert_eq!(listed, ids.iter().copied().collect::<Vec<_>>());

        let next = rt.block_on(lifecycle.create_next_index()).unwrap();
        prop_assert_eq!(next.id, max + 1);
    }

    #[test]
    fn latest_falls_back_after_deleting_the_max(ids in prop::collection::btree_set(1u64..10_000, 1..10)) {
        let engine = Arc::new(InMemorySearchEngine::new());
        for id in &ids {
            engine.insert_index(&format!("shop_{}", id));
        }
        let (catalog, lifecycle) = services(engine);
        let rt = runtime();

        let mut remaining: Vec<u64> = ids.into_iter().collect();
        while let Some(max) = remaining.pop() {
            let deleted = rt.block_on(lifecycle.delete_index(&IndexCriterion::Latest)).unwrap();
            prop_assert_eq!(deleted.id, max);

            let latest = rt.block_on(catalog.resolve(&IndexCriterion::Latest));
            match remaining.last() {
                Some(next_highest) => prop_assert_eq!(latest.unwrap().id, *next_highest),
                None => prop_assert!(matches!(
                    latest,
                    Err(SearchIndexError::NotFound(NotFoundReason::NoIndices))
                )),
            }
        }
    }

    #[test]
    fn alias_has_single_owner_after_every_move(targets in prop::collection::vec(1u64..=5, 1..15)) {
        let engine = Arc::new(InMemorySearchEngine::new());
        for id in 1..=5 {
            engine.insert_index(&format!("shop_{}", id));
        }
        let (catalog, lifecycle) = services(engine.clone());
        let rt = runtime();

        for target in targets {
            let name = format!("shop_{}", target);
            rt.block_on(lifecycle.set_alias(&name)).unwrap();

            prop_assert_eq!(engine.bindings("shop"), vec![name.clone()]);
            let aliased = rt.block_on(catalog.resolve(&IndexCriterion::Aliased)).unwrap();
            prop_assert_eq!(aliased.name, name);
        }
    }
}

#[tokio::test]
async fn create_next_index_on_empty_catalog_is_one() {
    let engine = Arc::new(InMemorySearchEngine::new());
    let (_, lifecycle) = services(engine.clone());

    let version = lifecycle.create_next_index_and_apply_mappings().await.unwrap();
    assert_eq!(version.name, "shop_1");
    assert_eq!(
        engine.mapping("shop_1").unwrap()["sku"]["type"],
        "keyword"
    );
}
