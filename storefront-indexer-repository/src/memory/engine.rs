//! In-memory search engine for testing and local development.
//!
//! `InMemorySearchEngine` behaves like the subset of OpenSearch the indexer relies
//! on: indices with append-only mappings, aliases, background reindex tasks and
//! document writes. Failures can be scripted per operation and target so tests can
//! drive every error path of the catalog, lifecycle and import services.
//!
//! # Example
//!
//! ```ignore
//! use storefront_indexer_repository::memory::{EngineOperation, InMemorySearchEngine};
//! use storefront_indexer_repository::SearchIndexError;
//!
//! let engine = InMemorySearchEngine::new();
//! engine.insert_index("shop_3");
//! engine.fail(EngineOperation::DeleteIndex, Some("shop_3"), SearchIndexError::infrastructure("down"));
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use storefront_indexer_shared::{Document, Mapping};
use tokio_util::sync::CancellationToken;

use crate::errors::{NotFoundReason, SearchIndexError};
use crate::interfaces::SearchIndexProvider;
use crate::types::{Acknowledgment, IndexListing, ReindexTask, TaskStatus};

/// Engine calls that can be scripted to fail.
///
/// The target a rule matches depends on the operation: the document type for
/// `PutMapping`, the document id for `IndexDocument`, the source index for
/// `Reindex`, the task id for `TaskStatus`, the alias for `ListAliasBindings`, the
/// pattern for `ListIndices` and the index name for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    ListIndices,
    ListAliasBindings,
    CreateIndex,
    DeleteIndex,
    PutMapping,
    PutAlias,
    DeleteAlias,
    Reindex,
    TaskStatus,
    IndexDocument,
}

#[derive(Debug, Clone)]
enum Outcome {
    Error(SearchIndexError),
    Unacknowledged,
    Cancel(CancellationToken),
}

#[derive(Debug, Clone)]
struct FailureRule {
    operation: EngineOperation,
    target: Option<String>,
    outcome: Outcome,
}

#[derive(Debug, Default)]
struct IndexState {
    properties: Map<String, Value>,
    documents: BTreeMap<String, Document>,
    created_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: BTreeMap<String, IndexState>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    peak_bindings: HashMap<String, usize>,
    tasks: BTreeMap<String, TaskStatus>,
    next_task: u64,
    next_document: u64,
}

/// In-memory `SearchIndexProvider`.
#[derive(Default)]
pub struct InMemorySearchEngine {
    state: Mutex<EngineState>,
    rules: Mutex<Vec<FailureRule>>,
    operations: Mutex<Vec<String>>,
    alias_delete_delay: Option<Duration>,
    write_delay: Option<Duration>,
    writes_in_flight: AtomicUsize,
    peak_writes_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemorySearchEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every alias deletion, so the new binding settles first.
    pub fn with_alias_delete_delay(mut self, delay: Duration) -> Self {
        self.alias_delete_delay = Some(delay);
        self
    }

    /// Delay every document write.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Create an index directly, bypassing failure rules and the operation log.
    pub fn insert_index(&self, name: &str) {
        lock(&self.state)
            .indices
            .entry(name.to_string())
            .or_insert_with(|| IndexState {
                created_at: Some(Utc::now()),
                ..IndexState::default()
            });
    }

    /// Bind an alias directly, bypassing failure rules and the operation log.
    pub fn insert_alias(&self, index: &str, alias: &str) {
        let mut state = lock(&self.state);
        let bound = state.aliases.entry(alias.to_string()).or_default();
        bound.insert(index.to_string());
        let count = bound.len();
        let peak = state.peak_bindings.entry(alias.to_string()).or_default();
        *peak = (*peak).max(count);
    }

    /// Make `operation` fail with `error`, for every target or only for `target`.
    pub fn fail(&self, operation: EngineOperation, target: Option<&str>, error: SearchIndexError) {
        lock(&self.rules).push(FailureRule {
            operation,
            target: target.map(str::to_string),
            outcome: Outcome::Error(error),
        });
    }

    /// Make `operation` answer `acknowledged: false`.
    pub fn reject(&self, operation: EngineOperation, target: Option<&str>) {
        lock(&self.rules).push(FailureRule {
            operation,
            target: target.map(str::to_string),
            outcome: Outcome::Unacknowledged,
        });
    }

    /// Cancel `token` when `operation` is called; the call itself still succeeds.
    pub fn cancel_on(
        &self,
        operation: EngineOperation,
        target: Option<&str>,
        token: CancellationToken,
    ) {
        lock(&self.rules).push(FailureRule {
            operation,
            target: target.map(str::to_string),
            outcome: Outcome::Cancel(token),
        });
    }

    /// Remove every scripted failure.
    pub fn clear_failures(&self) {
        lock(&self.rules).clear();
    }

    /// Names of every index, sorted.
    pub fn index_names(&self) -> Vec<String> {
        lock(&self.state).indices.keys().cloned().collect()
    }

    /// Whether `name` exists.
    pub fn has_index(&self, name: &str) -> bool {
        lock(&self.state).indices.contains_key(name)
    }

    /// Indices currently bound to `alias`, sorted.
    pub fn bindings(&self, alias: &str) -> Vec<String> {
        lock(&self.state)
            .aliases
            .get(alias)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Highest number of indices ever bound to `alias` at the same time.
    pub fn peak_bindings(&self, alias: &str) -> usize {
        lock(&self.state)
            .peak_bindings
            .get(alias)
            .copied()
            .unwrap_or(0)
    }

    /// Merged field mappings of `index`.
    pub fn mapping(&self, index: &str) -> Option<Map<String, Value>> {
        lock(&self.state)
            .indices
            .get(index)
            .map(|state| state.properties.clone())
    }

    /// Documents of `index`, ordered by document id.
    pub fn documents(&self, index: &str) -> Vec<Document> {
        lock(&self.state)
            .indices
            .get(index)
            .map(|state| state.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// A single document of `index`.
    pub fn document(&self, index: &str, id: &str) -> Option<Document> {
        lock(&self.state)
            .indices
            .get(index)
            .and_then(|state| state.documents.get(id).cloned())
    }

    /// Successful and failed calls, in order, as `"<operation> <target>"`.
    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    /// Highest number of concurrent `index_document` calls observed.
    pub fn peak_writes_in_flight(&self) -> usize {
        self.peak_writes_in_flight.load(Ordering::SeqCst)
    }

    /// Record the call and apply the first matching failure rule.
    fn check(
        &self,
        operation: EngineOperation,
        target: &str,
    ) -> Result<Option<Acknowledgment>, SearchIndexError> {
        lock(&self.operations).push(format!("{:?} {}", operation, target));

        let rules = lock(&self.rules);
        let rule = rules.iter().find(|rule| {
            rule.operation == operation
                && rule.target.as_deref().map_or(true, |t| t == target)
        });
        match rule.map(|rule| &rule.outcome) {
            Some(Outcome::Error(error)) => Err(error.clone()),
            Some(Outcome::Unacknowledged) => Ok(Some(Acknowledgment::rejected())),
            Some(Outcome::Cancel(token)) => {
                token.cancel();
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn store_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Document,
    ) -> Result<(), SearchIndexError> {
        self.check(EngineOperation::IndexDocument, id.unwrap_or_default())?;
        let mut state = lock(&self.state);
        state.next_document += 1;
        let key = match id {
            Some(id) => id.to_string(),
            None => format!("auto-{}", state.next_document),
        };
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;
        target.documents.insert(key, document.clone());
        Ok(())
    }

    fn missing_index(name: &str) -> SearchIndexError {
        SearchIndexError::not_found(NotFoundReason::IndexName(name.to_string()))
    }
}

/// Merge `incoming` into `existing`, refusing to change a field's type.
fn merge_properties(
    existing: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    path: &str,
) -> Result<(), String> {
    for (field, definition) in incoming {
        let field_path = if path.is_empty() {
            field.clone()
        } else {
            format!("{}.{}", path, field)
        };

        if !existing.contains_key(field) {
            existing.insert(field.clone(), definition.clone());
            continue;
        }
        let Some(current) = existing.get_mut(field) else {
            continue;
        };

        let current_type = current.get("type").and_then(Value::as_str);
        let new_type = definition.get("type").and_then(Value::as_str);
        if let (Some(from), Some(to)) = (current_type, new_type) {
            if from != to {
                return Err(format!(
                    "mapper [{}] cannot be changed from type [{}] to [{}]",
                    field_path, from, to
                ));
            }
        }

        // Multi-field upgrades and nested objects merge recursively.
        for key in ["properties", "fields"] {
            if let Some(Value::Object(incoming_children)) = definition.get(key) {
                let Value::Object(current_object) = &mut *current else {
                    continue;
                };
                let children = current_object
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(current_children) = children {
                    merge_properties(current_children, incoming_children, &field_path)?;
                }
            }
        }
    }
    Ok(())
}

fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchEngine {
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexListing>, SearchIndexError> {
        self.check(EngineOperation::ListIndices, pattern)?;
        let state = lock(&self.state);
        Ok(state
            .indices
            .iter()
            .filter(|(name, _)| matches_pattern(pattern, name))
            .map(|(name, index)| IndexListing {
                name: name.clone(),
                created_at: index.created_at,
            })
            .collect())
    }

    async fn list_alias_bindings(&self, alias: &str) -> Result<Vec<String>, SearchIndexError> {
        self.check(EngineOperation::ListAliasBindings, alias)?;
        Ok(self.bindings(alias))
    }

    async fn create_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::CreateIndex, name)? {
            return Ok(ack);
        }
        let mut state = lock(&self.state);
        if state.indices.contains_key(name) {
            return Err(SearchIndexError::infrastructure(format!(
                "resource_already_exists_exception: index [{}] already exists",
                name
            )));
        }
        state.indices.insert(
            name.to_string(),
            IndexState {
                created_at: Some(Utc::now()),
                ..IndexState::default()
            },
        );
        Ok(Acknowledgment::acknowledged())
    }

    async fn delete_index(&self, name: &str) -> Result<Acknowledgment, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::DeleteIndex, name)? {
            return Ok(ack);
        }
        let mut state = lock(&self.state);
        if state.indices.remove(name).is_none() {
            return Err(Self::missing_index(name));
        }
        for bound in state.aliases.values_mut() {
            bound.remove(name);
        }
        Ok(Acknowledgment::acknowledged())
    }

    async fn put_mapping(
        &self,
        index: &str,
        mapping: &Mapping,
    ) -> Result<Acknowledgment, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::PutMapping, &mapping.document_type)? {
            return Ok(ack);
        }
        let mut state = lock(&self.state);
        let target = state
            .indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;

        // Validate on a copy so a rejected mapping leaves the index untouched.
        let mut merged = target.properties.clone();
        merge_properties(&mut merged, &mapping.properties, "").map_err(|reason| {
            SearchIndexError::immutable_mapping(index, &mapping.document_type, reason)
        })?;
        target.properties = merged;
        Ok(Acknowledgment::acknowledged())
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<Acknowledgment, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::PutAlias, index)? {
            return Ok(ack);
        }
        if !self.has_index(index) {
            return Err(Self::missing_index(index));
        }
        self.insert_alias(index, alias);
        Ok(Acknowledgment::acknowledged())
    }

    async fn delete_alias(
        &self,
        index: &str,
        alias: &str,
    ) -> Result<Acknowledgment, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::DeleteAlias, index)? {
            return Ok(ack);
        }
        if let Some(delay) = self.alias_delete_delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        let removed = state
            .aliases
            .get_mut(alias)
            .map(|bound| bound.remove(index))
            .unwrap_or(false);
        if !removed {
            return Err(SearchIndexError::not_found(NotFoundReason::AliasBinding {
                alias: alias.to_string(),
                index: index.to_string(),
            }));
        }
        Ok(Acknowledgment::acknowledged())
    }

    async fn reindex(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<ReindexTask, SearchIndexError> {
        if let Some(ack) = self.check(EngineOperation::Reindex, source)? {
            return Err(SearchIndexError::infrastructure(format!(
                "Reindex of '{}' rejected (acknowledged: {})",
                source, ack.acknowledged
            )));
        }
        let mut state = lock(&self.state);
        let documents = state
            .indices
            .get(source)
            .map(|index| index.documents.clone())
            .ok_or_else(|| Self::missing_index(source))?;
        let dest = state
            .indices
            .get_mut(destination)
            .ok_or_else(|| Self::missing_index(destination))?;

        let copied = documents.len() as u64;
        dest.documents.extend(documents);

        state.next_task += 1;
        let task_id = format!("memory:{}", state.next_task);
        state.tasks.insert(
            task_id.clone(),
            TaskStatus {
                task_id: task_id.clone(),
                completed: true,
                total: Some(copied),
                created: Some(copied),
                updated: Some(0),
                failures: 0,
            },
        );

        Ok(ReindexTask {
            task_id,
            source: source.to_string(),
            destination: destination.to_string(),
        })
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SearchIndexError> {
        self.check(EngineOperation::TaskStatus, task_id)?;
        lock(&self.state)
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| SearchIndexError::not_found(NotFoundReason::Task(task_id.to_string())))
    }

    async fn index_document(
        &self,
        index: &str,
        id: Option<&str>,
        document: &Document,
    ) -> Result<(), SearchIndexError> {
        let in_flight = self.writes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_writes_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.store_document(index, id, document);

        self.writes_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(document_type: &str, properties: Value) -> Mapping {
        Mapping::new(document_type, properties.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_mapping_append_only() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");

        engine
            .put_mapping("shop_1", &mapping("product", json!({ "sku": { "type": "keyword" } })))
            .await
            .unwrap();
        engine
            .put_mapping("shop_1", &mapping("product", json!({ "name": { "type": "text" } })))
            .await
            .unwrap();

        let result = engine
            .put_mapping("shop_1", &mapping("product", json!({ "sku": { "type": "text" } })))
            .await;
        assert!(matches!(
            result,
            Err(SearchIndexError::ImmutableMappingError { ref document_type, .. }) if document_type == "product"
        ));

        let merged = engine.mapping("shop_1").unwrap();
        assert_eq!(merged["sku"]["type"], "keyword");
        assert_eq!(merged["name"]["type"], "text");
    }

    #[tokio::test]
    async fn test_multi_field_upgrade_allowed() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        engine
            .put_mapping("shop_1", &mapping("product", json!({ "name": { "type": "text" } })))
            .await
            .unwrap();

        let upgrade = json!({
            "name": { "type": "text", "fields": { "keyword": { "type": "keyword" } } }
        });
        engine
            .put_mapping("shop_1", &mapping("product", upgrade))
            .await
            .unwrap();

        let merged = engine.mapping("shop_1").unwrap();
        assert_eq!(merged["name"]["fields"]["keyword"]["type"], "keyword");
    }

    #[tokio::test]
    async fn test_list_indices_pattern() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.insert_index("other_1");

        let names: Vec<String> = engine
            .list_indices("shop_*")
            .await
            .unwrap()
            .into_iter()
            .map(|listing| listing.name)
            .collect();
        assert_eq!(names, vec!["shop_1", "shop_2"]);
    }

    #[tokio::test]
    async fn test_delete_missing_index_is_not_found() {
        let engine = InMemorySearchEngine::new();
        let result = engine.delete_index("shop_9").await;
        assert!(matches!(result, Err(SearchIndexError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_index_drops_bindings() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        engine.insert_alias("shop_1", "shop");

        engine.delete_index("shop_1").await.unwrap();
        assert!(engine.bindings("shop").is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failures_match_target() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        engine.fail(
            EngineOperation::DeleteIndex,
            Some("shop_2"),
            SearchIndexError::infrastructure("down"),
        );
        engine.reject(EngineOperation::CreateIndex, None);

        assert!(engine.delete_index("shop_1").await.is_ok());
        assert!(engine.delete_index("shop_2").await.is_err());
        let ack = engine.create_index("shop_3").await.unwrap();
        assert!(!ack.acknowledged);
        assert!(!engine.has_index("shop_3"));

        engine.clear_failures();
        assert!(engine.delete_index("shop_2").await.is_ok());
    }

    #[tokio::test]
    async fn test_reindex_copies_documents() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        engine.insert_index("shop_2");
        let doc = json!({ "id": 1 }).as_object().unwrap().clone();
        engine.index_document("shop_1", Some("product_1"), &doc).await.unwrap();

        let task = engine.reindex("shop_1", "shop_2").await.unwrap();
        assert_eq!(engine.document("shop_2", "product_1"), Some(doc));

        let status = engine.task_status(&task.task_id).await.unwrap();
        assert!(status.completed);
        assert_eq!(status.created, Some(1));
    }

    #[tokio::test]
    async fn test_index_document_generates_ids() {
        let engine = InMemorySearchEngine::new();
        engine.insert_index("shop_1");
        let doc = json!({ "title": "x" }).as_object().unwrap().clone();

        engine.index_document("shop_1", None, &doc).await.unwrap();
        engine.index_document("shop_1", None, &doc).await.unwrap();
        assert_eq!(engine.documents("shop_1").len(), 2);
    }
}
