//! Static catalog of field mappings, one per document type.
//!
//! The builtin catalog is compiled from the JSON files under `mappings/`. Each file
//! holds a `{ "properties": { ... } }` object named after its document type.
//! Deployments can replace it with a directory of files in the same format.

use std::path::Path;

use serde_json::Value;
use storefront_indexer_shared::Mapping;
use tokio::fs;
use tracing::info;

use crate::errors::SearchIndexError;

/// Builtin mappings in application order.
const BUILTIN_MAPPINGS: &[(&str, &str)] = &[
    ("attribute", include_str!("../mappings/attribute.json")),
    ("taxrule", include_str!("../mappings/taxrule.json")),
    ("category", include_str!("../mappings/category.json")),
    ("product", include_str!("../mappings/product.json")),
    ("cms_hierarchy", include_str!("../mappings/cms_hierarchy.json")),
    ("cms_page", include_str!("../mappings/cms_page.json")),
    ("cms_block", include_str!("../mappings/cms_block.json")),
    ("cms_storyblok", include_str!("../mappings/cms_storyblok.json")),
];

/// Ordered set of mappings applied to every new index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingCatalog {
    mappings: Vec<Mapping>,
}

impl MappingCatalog {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        Self { mappings }
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, SearchIndexError> {
        let mappings = BUILTIN_MAPPINGS
            .iter()
            .map(|(document_type, source)| parse_mapping(document_type, source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { mappings })
    }

    /// Load every `<document_type>.json` file of `dir`, ordered by document type.
    pub async fn from_dir(dir: &Path) -> Result<Self, SearchIndexError> {
        let mut entries = fs::read_dir(dir).await.map_err(|e| {
            SearchIndexError::mapping(format!("Failed to read {}: {}", dir.display(), e))
        })?;

        let mut mappings = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SearchIndexError::mapping(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(document_type) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let source = fs::read_to_string(&path).await.map_err(|e| {
                SearchIndexError::mapping(format!("Failed to read {}: {}", path.display(), e))
            })?;
            mappings.push(parse_mapping(document_type, &source)?);
        }

        if mappings.is_empty() {
            return Err(SearchIndexError::mapping(format!(
                "No mapping files found in {}",
                dir.display()
            )));
        }

        mappings.sort_by(|a, b| a.document_type.cmp(&b.document_type));
        info!(dir = %dir.display(), count = mappings.len(), "Loaded mapping catalog");
        Ok(Self { mappings })
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn get(&self, document_type: &str) -> Option<&Mapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.document_type == document_type)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn parse_mapping(document_type: &str, source: &str) -> Result<Mapping, SearchIndexError> {
    let value: Value = serde_json::from_str(source).map_err(|e| {
        SearchIndexError::mapping(format!("Invalid mapping '{}': {}", document_type, e))
    })?;

    let properties = match value.get("properties") {
        Some(Value::Object(properties)) => properties.clone(),
        _ => {
            return Err(SearchIndexError::mapping(format!(
                "Mapping '{}' has no properties object",
                document_type
            )))
        }
    };

    Ok(Mapping::new(document_type, properties))
}

/// Build a catalog entry from a JSON `properties` object, for tests and tools.
pub fn mapping_from_value(document_type: &str, properties: Value) -> Result<Mapping, SearchIndexError> {
    match properties {
        Value::Object(map) => Ok(Mapping::new(document_type, map)),
        _ => Err(SearchIndexError::mapping(format!(
            "Mapping '{}' properties must be an object",
            document_type
        ))),
    }
}
