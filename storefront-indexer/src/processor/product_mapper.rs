//! Product variant expansion.
//!
//! Configurable products arrive with their variants embedded under
//! `configurable_children`. The storefront searches variants directly, so each
//! child becomes its own record pointing back to the parent.

use async_trait::async_trait;
use serde_json::Value;
use storefront_indexer_shared::Document;
use tracing::debug;

use crate::errors::MapError;
use crate::processor::RecordMapper;

const CHILDREN_FIELD: &str = "configurable_children";

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigurableProductMapper;

#[async_trait]
impl RecordMapper for ConfigurableProductMapper {
    async fn map(&self, mut document: Document) -> Result<Vec<Document>, MapError> {
        let children = match document.remove(CHILDREN_FIELD) {
            None | Some(Value::Null) => return Ok(vec![document]),
            Some(Value::Array(children)) => children,
            Some(other) => {
                return Err(MapError::new(format!(
                    "{} is not an array: {}",
                    CHILDREN_FIELD, other
                )))
            }
        };

        let parent_id = document.get("id").cloned().unwrap_or(Value::Null);
        let mut child_ids = Vec::with_capacity(children.len());
        let mut records = Vec::with_capacity(children.len() + 1);

        for child in children {
            let Value::Object(mut child) = child else {
                return Err(MapError::new(format!(
                    "variant of product {} is not an object",
                    parent_id
                )));
            };
            if let Some(id) = child.get("id") {
                child_ids.push(id.clone());
            }
            child.insert("parent_id".to_string(), parent_id.clone());
            records.push(child);
        }

        debug!(parent_id = %parent_id, variants = records.len(), "Expanded configurable product");
        document.insert(CHILDREN_FIELD.to_string(), Value::Array(child_ids));
        records.insert(0, document);
        Ok(records)
    }
}
