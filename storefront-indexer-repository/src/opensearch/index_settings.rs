//! OpenSearch index settings sent when a new index version is created.
//!
//! Mappings are not part of the create body: they are applied afterwards, one
//! document type at a time, so a failing type can be reported and rolled back.

use serde_json::{json, Value};

/// Shard layout and limits for new index versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// Upper bound on mapped fields; product documents carry many attributes.
    pub total_fields_limit: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
            total_fields_limit: 2000,
        }
    }
}

impl IndexSettings {
    /// The `PUT <index>` request body.
    pub fn to_body(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas,
                "index.mapping.total_fields.limit": self.total_fields_limit
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_body() {
        let body = IndexSettings::default().to_body();
        assert_eq!(body["settings"]["number_of_shards"], 1);
        assert_eq!(body["settings"]["number_of_replicas"], 1);
        assert_eq!(body["settings"]["index.mapping.total_fields.limit"], 2000);
        assert!(body.get("mappings").is_none());
    }
}
