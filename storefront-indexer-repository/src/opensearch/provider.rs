//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opensearch::{
    cat::CatIndicesParts,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{
        IndicesCreateParts, IndicesDeleteAliasParts, IndicesDeleteParts, IndicesGetAliasParts,
        IndicesPutAliasParts, IndicesPutMappingParts,
    },
    tasks::TasksGetParts,
    IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use storefront_indexer_shared::{Document, Mapping};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::{NotFoundReason, SearchIndexError};
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_settings::IndexSettings;
use crate::types::{Acknowledgment, IndexListing, ReindexTask, TaskStatus};

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use storefront_indexer_repository::opensearch::{IndexSettings, OpenSearchProvider};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexSettings::default()).await?;
/// provider.create_index("vue_storefront_catalog_1").await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    settings: IndexSettings,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `settings` - Settings sent with every `create_index`
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, settings: IndexSettings) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch provider");

        Ok(Self { client, settings })
    }

    /// Check that the cluster answers.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::infrastructure(format!(
                "Ping failed with status {}",
                status
            )));
        }
        Ok(())
    }

    /// Read a JSON body, mapping decode failures to `ParseError`.
    async fn json_body(response: Response) -> Result<Value, SearchIndexError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Read an acknowledged body from a successful response.
    async fn acknowledgment(response: Response) -> Result<Acknowledgment, SearchIndexError> {
        let body = Self::json_body(response).await?;
        Ok(parse_acknowledgment(&body))
    }

    /// Convert a non-success response into an error, logging the body.
    async fn failure(response: Response, operation: &str, target: &str) -> SearchIndexError {
        let status = response.status_code();
        let error_body = response.text().await.unwrap_or_default();
        error!(
            status = %status,
            operation = operation,
            target = target,
            body = %error_body,
            "OpenSearch request failed"
        );
        SearchIndexError::infrastructure(format!(
            "{} on '{}' failed with status {}: {}",
            operation, target, status, error_body
        ))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    #[instrument(skip(self))]
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexListing>, SearchIndexError> {
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::Index(&[pattern]))
            .format("json")
            .h(&["index", "creation.date"])
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        // A wildcard that matches nothing is not an error on every engine version.
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::failure(response, "list indices", pattern).await);
        }

        let body = Self::json_body(response).await?;
        let listings = parse_cat_indices(&body)?;
        debug!(pattern = %pattern, count = listings.len(), "Listed indices");
        Ok(listings)
    }

    #[instrument(skip(self))]
    async fn list_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::failure(response, "get alias", alias).await);
        }

        let body = Self::json_body(response).await?;
        Ok(parse_alias_bindings(&body))
    }

    #[instrument(skip(self))]
    async fn create_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(self.settings.to_body())
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(Self::failure(response, "create index", name).await);
        }

        info!(index = %name, "Created index");
        Self::acknowledgment(response).await
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(NotFoundReason::IndexName(
                name.to_string(),
            )));
        }
        if !status.is_success() {
            return Err(Self::failure(response, "delete index", name).await);
        }

        info!(index = %name, "Deleted index");
        Self::acknowledgment(response).await
    }

    #[instrument(skip(self, mapping), fields(document_type = %mapping.document_type))]
    async fn put_mapping(
        &self,
        index: &str,
        mapping: &Mapping,
    ) -> Result<Acknowledgment, SearchIndexError> {
        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[index]))
            .body(json!({ "properties": mapping.properties }))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(NotFoundReason::IndexName(
                index.to_string(),
            )));
        }
        if status.as_u16() == 400 {
            let error_body = response.text().await.unwrap_or_default();
            error!(index = %index, body = %error_body, "Mapping rejected");
            return Err(match mapping_conflict_reason(&error_body) {
                Some(reason) => {
                    SearchIndexError::immutable_mapping(index, &mapping.document_type, reason)
                }
                None => SearchIndexError::mapping(format!(
                    "Mapping '{}' rejected by '{}': {}",
                    mapping.document_type, index, error_body
                )),
            });
        }
        if !status.is_success() {
            return Err(Self::failure(response, "put mapping", index).await);
        }

        debug!(index = %index, "Mapping applied");
        Self::acknowledgment(response).await
    }

    #[instrument(skip(self))]
    async fn put_alias(&self, index: &str, alias: &str) -> Result<Acknowledgment, SearchIndexError> {
        let response = self
            .client
            .indices()
            .put_alias(IndicesPutAliasParts::IndexName(&[index], alias))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(NotFoundReason::IndexName(
                index.to_string(),
            )));
        }
        if !status.is_success() {
            return Err(Self::failure(response, "put alias", index).await);
        }

        info!(index = %index, alias = %alias, "Alias bound");
        Self::acknowledgment(response).await
    }

    #[instrument(skip(self))]
    async fn delete_alias(
        &self,
        index: &str,
        alias: &str,
    ) -> Result<Acknowledgment, SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete_alias(IndicesDeleteAliasParts::IndexName(&[index], &[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(NotFoundReason::AliasBinding {
                alias: alias.to_string(),
                index: index.to_string(),
            }));
        }
        if !status.is_success() {
            return Err(Self::failure(response, "delete alias", index).await);
        }

        info!(index = %index, alias = %alias, "Alias binding removed");
        Self::acknowledgment(response).await
    }

    #[instrument(skip(self))]
    async fn reindex(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<ReindexTask, SearchIndexError> {
        let response = self
            .client
            .reindex()
            .wait_for_completion(false)
            .body(json!({
                "source": { "index": source },
                "dest": { "index": destination }
            }))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(Self::failure(response, "reindex", source).await);
        }

        let body = Self::json_body(response).await?;
        let task_id = body["task"]
            .as_str()
            .ok_or_else(|| SearchIndexError::parse("Reindex response carries no task id"))?;

        info!(source = %source, destination = %destination, task_id = %task_id, "Reindex started");
        Ok(ReindexTask {
            task_id: task_id.to_string(),
            source: source.to_string(),
            destination: destination.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SearchIndexError> {
        let response = self
            .client
            .tasks()
            .get(TasksGetParts::TaskId(task_id))
            .send()
            .await
            .map_err(|e| SearchIndexError::infrastructure(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchIndexError::not_found(NotFoundReason::Task(
                task_id.to_string(),
            )));
        }
        if !status.is_success() {
            return Err(Self::failure(response, "get task", task_id).await);
        }

        let body = Self::json_body(response).await?;
        Ok(parse_task_status(task_id, &body))
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Document,
    ) -> Result<(), SearchIndexError> {
        let parts = match id {
            Some(id) => IndexParts::IndexId(index, id),
            None => IndexParts::Index(index),
        };

        let response = self
            .client
            .index(parts)
            .body(document)
            .send()
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index request failed");
            return Err(SearchIndexError::index(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, doc_id = ?id, "Document indexed");
        Ok(())
    }
}

/// Parse the `acknowledged` flag; a body without one counts as not acknowledged.
fn parse_acknowledgment(body: &Value) -> Acknowledgment {
    Acknowledgment {
        acknowledged: body["acknowledged"].as_bool().unwrap_or(false),
    }
}

/// Parse a `_cat/indices?format=json&h=index,creation.date` body.
fn parse_cat_indices(body: &Value) -> Result<Vec<IndexListing>, SearchIndexError> {
    let rows = body
        .as_array()
        .ok_or_else(|| SearchIndexError::parse("Index listing is not an array"))?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = row["index"].as_str()?;
            Some(IndexListing {
                name: name.to_string(),
                created_at: parse_creation_date(&row["creation.date"]),
            })
        })
        .collect())
}

/// `creation.date` is epoch milliseconds, rendered as a string by `_cat`.
fn parse_creation_date(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

/// Parse a `GET _alias/<name>` body: one key per bound index.
fn parse_alias_bindings(body: &Value) -> Vec<String> {
    let mut names: Vec<String> = body
        .as_object()
        .map(|indices| indices.keys().cloned().collect())
        .unwrap_or_default();
    names.sort();
    names
}

/// Parse a `GET _tasks/<id>` body.
fn parse_task_status(task_id: &str, body: &Value) -> TaskStatus {
    let task_status = &body["task"]["status"];
    TaskStatus {
        task_id: task_id.to_string(),
        completed: body["completed"].as_bool().unwrap_or(false),
        total: task_status["total"].as_u64(),
        created: task_status["created"].as_u64(),
        updated: task_status["updated"].as_u64(),
        failures: body["response"]["failures"]
            .as_array()
            .map(|failures| failures.len())
            .unwrap_or(0),
    }
}

/// Detect the engine's refusal to change an existing field.
///
/// Returns the engine's reason when the 400 body is an `illegal_argument_exception`,
/// which is how both OpenSearch and Elasticsearch report mapper conflicts.
fn mapping_conflict_reason(error_body: &str) -> Option<String> {
    let body: Value = serde_json::from_str(error_body).ok()?;
    let error = &body["error"];
    let root = error["root_cause"]
        .as_array()
        .and_then(|causes| causes.first())
        .unwrap_or(error);

    if root["type"].as_str()? != "illegal_argument_exception" {
        return None;
    }
    Some(root["reason"].as_str().unwrap_or("field type change").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cat_indices() {
        let body = json!([
            { "index": "shop_2", "creation.date": "1700000000000" },
            { "index": "shop_1", "creation.date": "not a date" },
            { "health": "green" }
        ]);
        let listings = parse_cat_indices(&body).unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "shop_2");
        assert_eq!(
            listings[0].created_at,
            DateTime::from_timestamp_millis(1_700_000_000_000)
        );
        assert_eq!(listings[1].created_at, None);
    }

    #[test]
    fn test_parse_cat_indices_rejects_object() {
        let result = parse_cat_indices(&json!({ "error": "x" }));
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }

    #[test]
    fn test_parse_alias_bindings() {
        let body = json!({
            "shop_4": { "aliases": { "shop": {} } },
            "shop_3": { "aliases": { "shop": {} } }
        });
        assert_eq!(parse_alias_bindings(&body), vec!["shop_3", "shop_4"]);
        assert!(parse_alias_bindings(&json!({})).is_empty());
    }

    #[test]
    fn test_parse_acknowledgment() {
        assert!(parse_acknowledgment(&json!({ "acknowledged": true })).acknowledged);
        assert!(!parse_acknowledgment(&json!({ "acknowledged": false })).acknowledged);
        assert!(!parse_acknowledgment(&json!({})).acknowledged);
    }

    #[test]
    fn test_parse_task_status() {
        let body = json!({
            "completed": true,
            "task": { "status": { "total": 120, "created": 118, "updated": 2 } },
            "response": { "failures": [] }
        });
        let status = parse_task_status("node:1", &body);

        assert!(status.completed);
        assert_eq!(status.total, Some(120));
        assert_eq!(status.created, Some(118));
        assert_eq!(status.updated, Some(2));
        assert_eq!(status.failures, 0);
    }

    #[test]
    fn test_parse_task_status_running() {
        let body = json!({ "completed": false, "task": { "status": { "total": 0 } } });
        let status = parse_task_status("node:2", &body);
        assert!(!status.completed);
        assert_eq!(status.created, None);
    }

    #[test]
    fn test_mapping_conflict_reason() {
        let body = r#"{
            "error": {
                "root_cause": [{
                    "type": "illegal_argument_exception",
                    "reason": "mapper [sku] cannot be changed from type [keyword] to [text]"
                }],
                "type": "illegal_argument_exception",
                "reason": "mapper [sku] cannot be changed from type [keyword] to [text]"
            },
            "status": 400
        }"#;
        let reason = mapping_conflict_reason(body).unwrap();
        assert!(reason.contains("cannot be changed"));
    }

    #[test]
    fn test_mapping_conflict_reason_other_errors() {
        let body = r#"{ "error": { "type": "mapper_parsing_exception", "reason": "bad" } }"#;
        assert_eq!(mapping_conflict_reason(body), None);
        assert_eq!(mapping_conflict_reason("not json"), None);
    }
}
