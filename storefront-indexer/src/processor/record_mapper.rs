//! Record mapper capability and its per-entity registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use storefront_indexer_shared::Document;

use crate::errors::MapError;
use crate::processor::ConfigurableProductMapper;

/// Maps one upstream document to zero or more index records.
#[async_trait]
pub trait RecordMapper: Send + Sync {
    async fn map(&self, document: Document) -> Result<Vec<Document>, MapError>;
}

/// Passes every document through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMapper;

#[async_trait]
impl RecordMapper for IdentityMapper {
    async fn map(&self, document: Document) -> Result<Vec<Document>, MapError> {
        Ok(vec![document])
    }
}

/// Mapper lookup by entity type. Unregistered types use [`IdentityMapper`].
#[derive(Clone)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<dyn RecordMapper>>,
    fallback: Arc<dyn RecordMapper>,
}

impl MapperRegistry {
    /// A registry that maps everything through the identity mapper.
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
            fallback: Arc::new(IdentityMapper),
        }
    }

    /// The mappers the CLI uses: products are expanded into their variants.
    pub fn with_defaults() -> Self {
        Self::new().with("product", Arc::new(ConfigurableProductMapper))
    }

    pub fn with(mut self, entity_type: &str, mapper: Arc<dyn RecordMapper>) -> Self {
        self.register(entity_type, mapper);
        self
    }

    pub fn register(&mut self, entity_type: &str, mapper: Arc<dyn RecordMapper>) {
        self.mappers.insert(entity_type.to_string(), mapper);
    }

    pub fn mapper_for(&self, entity_type: &str) -> Arc<dyn RecordMapper> {
        self.mappers
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct DropAll;

    #[async_trait]
    impl RecordMapper for DropAll {
        async fn map(&self, _document: Document) -> Result<Vec<Document>, MapError> {
            Ok(vec![])
        }
    }

    fn doc() -> Document {
        json!({ "id": 1, "name": "Lamp" }).as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_unregistered_type_uses_identity() {
        let registry = MapperRegistry::new().with("product", Arc::new(DropAll));

        let records = registry.mapper_for("category").map(doc()).await.unwrap();
        assert_eq!(records, vec![doc()]);

        let records = registry.mapper_for("product").map(doc()).await.unwrap();
        assert!(records.is_empty());
    }
}
