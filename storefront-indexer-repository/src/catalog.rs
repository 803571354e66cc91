//! Index catalog: which index versions exist and which one an operator means.
//!
//! Versions are discovered from the engine on every call; nothing is cached, so
//! the catalog never disagrees with the engine about what exists.

use std::sync::Arc;

use storefront_indexer_shared::{IndexVersion, SelectedIndexRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::IndexConfig;
use crate::errors::{NotFoundReason, SearchIndexError};
use crate::interfaces::{SearchIndexProvider, SelectionRepository};
use crate::types::IndexCriterion;
use crate::utils::cancellable;

/// Everything the `info` command prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub alias: String,
    pub indices: Vec<IndexVersion>,
    pub latest: Option<IndexVersion>,
    pub aliased: Option<IndexVersion>,
    pub selected: Option<IndexVersion>,
}

/// Lists and resolves index versions of one prefix.
///
/// # Example
///
/// ```ignore
/// let catalog = IndexCatalog::new(provider, selection, IndexConfig::with_prefix_alias("shop"), cancel);
/// let current = catalog.resolve(&IndexCriterion::Aliased).await?;
/// ```
pub struct IndexCatalog {
    provider: Arc<dyn SearchIndexProvider>,
    selection: Arc<dyn SelectionRepository>,
    config: IndexConfig,
    cancel: CancellationToken,
}

impl IndexCatalog {
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        selection: Arc<dyn SelectionRepository>,
        config: IndexConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            selection,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Every version of the configured prefix, sorted by id ascending.
    ///
    /// Names that share the prefix but do not end in `_<digits>` are ignored.
    #[instrument(skip(self), fields(prefix = %self.config.prefix))]
    pub async fn list_indices(&self) -> Result<Vec<IndexVersion>, SearchIndexError> {
        let pattern = self.config.index_pattern();
        let listings = cancellable(&self.cancel, self.provider.list_indices(&pattern)).await?;

        let mut versions: Vec<IndexVersion> = listings
            .into_iter()
            .filter_map(|listing| {
                let version = IndexVersion::parse(&self.config.prefix, &listing.name);
                if version.is_none() {
                    debug!(index = %listing.name, "Ignoring index outside the version scheme");
                }
                version.map(|v| v.with_created_at(listing.created_at))
            })
            .collect();
        versions.sort_by_key(|version| version.id);
        Ok(versions)
    }

    /// The version with the highest id.
    pub async fn latest(&self) -> Result<IndexVersion, SearchIndexError> {
        self.list_indices()
            .await?
            .pop()
            .ok_or(SearchIndexError::NotFound(NotFoundReason::NoIndices))
    }

    /// The single version bound to the public alias.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexVersion)` - If exactly one index holds the alias
    /// * `Err(SearchIndexError::NotFound)` - If no index holds it
    /// * `Err(SearchIndexError::AliasInvariantViolation)` - If several indices hold it
    #[instrument(skip(self), fields(alias = %self.config.alias))]
    pub async fn aliased(&self) -> Result<IndexVersion, SearchIndexError> {
        let alias = &self.config.alias;
        let mut bound = cancellable(&self.cancel, self.provider.list_alias_bindings(alias)).await?;

        match bound.len() {
            0 => Err(SearchIndexError::not_found(NotFoundReason::NoAlias {
                alias: alias.clone(),
            })),
            1 => {
                let name = bound.remove(0);
                let version = IndexVersion::parse(&self.config.prefix, &name).ok_or_else(|| {
                    SearchIndexError::parse(format!(
                        "Alias '{}' is bound to '{}', which is not a version of '{}'",
                        alias, name, self.config.prefix
                    ))
                })?;
                Ok(version)
            }
            _ => {
                warn!(alias = %alias, indices = ?bound, "Alias bound to more than one index");
                Err(SearchIndexError::AliasInvariantViolation {
                    alias: alias.clone(),
                    indices: bound,
                })
            }
        }
    }

    /// The operator's persisted selection, checked against the live catalog.
    pub async fn selected(&self) -> Result<IndexVersion, SearchIndexError> {
        let record = self
            .selection
            .load()
            .await?
            .ok_or(SearchIndexError::NotFound(NotFoundReason::NoSelection))?;

        self.list_indices()
            .await?
            .into_iter()
            .find(|version| version.name == record.name)
            .ok_or(SearchIndexError::NotFound(NotFoundReason::SelectionStale {
                name: record.name,
            }))
    }

    /// Resolve `criterion` to an existing index version.
    #[instrument(skip(self))]
    pub async fn resolve(&self, criterion: &IndexCriterion) -> Result<IndexVersion, SearchIndexError> {
        match criterion {
            IndexCriterion::Id(id) => self
                .list_indices()
                .await?
                .into_iter()
                .find(|version| version.id == *id)
                .ok_or(SearchIndexError::NotFound(NotFoundReason::IndexId(*id))),
            IndexCriterion::Name(name) => self
                .list_indices()
                .await?
                .into_iter()
                .find(|version| &version.name == name)
                .ok_or_else(|| SearchIndexError::not_found(NotFoundReason::IndexName(name.clone()))),
            IndexCriterion::Latest => self.latest().await,
            IndexCriterion::Aliased => self.aliased().await,
            IndexCriterion::Selected => self.selected().await,
        }
    }

    /// Resolve `criterion` and persist it as the operator's selection.
    pub async fn select(&self, criterion: &IndexCriterion) -> Result<IndexVersion, SearchIndexError> {
        let version = self.resolve(criterion).await?;
        self.selection
            .save(&SelectedIndexRecord::from(&version))
            .await?;
        info!(index = %version.name, "Index selected");
        Ok(version)
    }

    /// Collect the catalog state for display.
    ///
    /// Missing aliased or selected indices show up as `None`; engine failures and
    /// alias invariant violations are returned as errors.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot, SearchIndexError> {
        let indices = self.list_indices().await?;
        let latest = indices.last().cloned();
        let aliased = absent_as_none(self.aliased().await)?;
        let selected = absent_as_none(self.selected().await)?;

        Ok(CatalogSnapshot {
            alias: self.config.alias.clone(),
            indices,
            latest,
            aliased,
            selected,
        })
    }
}

fn absent_as_none<T>(result: Result<T, SearchIndexError>) -> Result<Option<T>, SearchIndexError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SearchIndexError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
