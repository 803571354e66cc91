//! Field mappings applied to an index, one per document type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field mapping for one document type.
///
/// Mappings are append-only in the engine: new fields can be added to an existing
/// index, but changing the type of a field that already exists requires a reindex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// The document type this mapping describes (e.g. `product`, `cms_page`).
    pub document_type: String,
    /// Field name to field definition, as sent in the `properties` body.
    pub properties: Map<String, Value>,
}

impl Mapping {
    /// Create a mapping for `document_type`.
    pub fn new(document_type: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self {
            document_type: document_type.into(),
            properties,
        }
    }

    /// The declared `type` of a top-level field, if any.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.properties.get(field)?.get("type")?.as_str()
    }
}
