//! Documents moved from upstream sources into the search index.
//!
//! Document schemas (product, category, CMS page, ...) are owned by the upstream
//! systems, so documents are carried as opaque JSON objects.

use serde_json::{Map, Value};

/// An opaque JSON document.
pub type Document = Map<String, Value>;

/// Derive the search-engine document ID for a record of `entity_type`.
///
/// Uses the record's `id` field (string or number) prefixed by the entity type, so
/// records of different types sharing one index never collide. Returns `None` when
/// the record has no usable `id`, in which case the engine assigns one.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use storefront_indexer_shared::document_id;
///
/// let doc = json!({ "id": 42, "sku": "lamp" });
/// assert_eq!(document_id("product", doc.as_object().unwrap()), Some("product_42".to_string()));
/// ```
pub fn document_id(entity_type: &str, document: &Document) -> Option<String> {
    let id = match document.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(format!("{}_{}", entity_type, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_document_id_numeric_and_string() {
        assert_eq!(
            document_id("category", &doc(json!({ "id": 7 }))),
            Some("category_7".to_string())
        );
        assert_eq!(
            document_id("cms_storyblok", &doc(json!({ "id": "abc-1" }))),
            Some("cms_storyblok_abc-1".to_string())
        );
    }

    #[test]
    fn test_document_id_missing_or_unusable() {
        assert_eq!(document_id("product", &doc(json!({ "sku": "x" }))), None);
        assert_eq!(document_id("product", &doc(json!({ "id": "" }))), None);
        assert_eq!(document_id("product", &doc(json!({ "id": null }))), None);
    }
}
