//! Dependency initialization and wiring for the indexer.

use std::sync::Arc;
use std::time::Duration;

use storefront_indexer_repository::opensearch::IndexSettings;
use storefront_indexer_repository::{
    FileSelectionRepository, IndexCatalog, IndexLifecycleManager, MappingCatalog,
    OpenSearchProvider, ReindexOrchestrator, SearchIndexProvider, SelectionRepository,
};
use storefront_sources::{DocumentSource, DocumentSourceKind, RetryPolicy};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, ConnectionMode};
use crate::importer::Importer;
use crate::loader::SearchLoader;
use crate::processor::MapperRegistry;
use crate::IndexingError;

/// Upstream systems documents are imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSystem {
    /// The commerce backend's bridge.
    VsBridge,
    /// The headless CMS.
    Storyblok,
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub provider: Arc<dyn SearchIndexProvider>,
    pub catalog: Arc<IndexCatalog>,
    pub lifecycle: Arc<IndexLifecycleManager>,
    pub reindex: ReindexOrchestrator,
    pub importer: Importer,
    pub config: AppConfig,
    pub cancel: CancellationToken,
}

impl Dependencies {
    /// Connect to OpenSearch and wire every service.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (connection errors only in fail-fast mode)
    pub async fn new(config: AppConfig, cancel: CancellationToken) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index_prefix = %config.index.prefix,
            index_alias = %config.index.alias,
            connection_mode = ?config.connection_mode,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let provider = Self::connect_to_opensearch(
            &config.opensearch_url,
            config.connection_mode,
            config.retry_interval,
            &cancel,
        )
        .await?;

        info!("OpenSearch connection established");

        let mappings = match &config.mappings_dir {
            Some(dir) => MappingCatalog::from_dir(dir).await,
            None => MappingCatalog::builtin(),
        }
        .map_err(|e| IndexingError::config(format!("Failed to load mappings: {}", e)))?;
        info!(count = mappings.len(), "Mappings loaded");

        let selection = Arc::new(FileSelectionRepository::new(config.selection_file.clone()));

        Ok(Self::with_provider(
            config,
            Arc::new(provider),
            selection,
            mappings,
            MapperRegistry::with_defaults(),
            cancel,
        ))
    }

    /// Wire the services around an already connected provider.
    pub fn with_provider(
        config: AppConfig,
        provider: Arc<dyn SearchIndexProvider>,
        selection: Arc<dyn SelectionRepository>,
        mappings: MappingCatalog,
        mappers: MapperRegistry,
        cancel: CancellationToken,
    ) -> Self {
        let catalog = Arc::new(IndexCatalog::new(
            provider.clone(),
            selection,
            config.index.clone(),
            cancel.clone(),
        ));
        let lifecycle = Arc::new(IndexLifecycleManager::new(
            catalog.clone(),
            provider.clone(),
            mappings,
            cancel.clone(),
        ));
        let reindex = ReindexOrchestrator::new(lifecycle.clone(), provider.clone(), cancel.clone());
        let importer = Importer::new(
            Arc::new(SearchLoader::new(provider.clone())),
            mappers,
            cancel.clone(),
        );

        Self {
            provider,
            catalog,
            lifecycle,
            reindex,
            importer,
            config,
            cancel,
        }
    }

    /// Build the configured source for `system`, wrapped in the retry policy.
    pub async fn document_source(
        &self,
        system: SourceSystem,
    ) -> Result<Box<dyn DocumentSource>, IndexingError> {
        let kind = match system {
            SourceSystem::VsBridge => self
                .config
                .vsbridge
                .clone()
                .map(DocumentSourceKind::vsbridge)
                .ok_or_else(|| IndexingError::config("VSBRIDGE_URL is not set"))?,
            SourceSystem::Storyblok => self
                .config
                .storyblok
                .clone()
                .map(DocumentSourceKind::storyblok)
                .ok_or_else(|| IndexingError::config("STORYBLOK_TOKEN is not set"))?,
        };
        let policy: RetryPolicy = self.config.source_retry;
        Ok(kind.into_source(policy, self.cancel.clone()).await?)
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<OpenSearchProvider, IndexingError> {
        loop {
            match Self::try_connect_opensearch(url).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return Err(IndexingError::config("Cancelled while connecting to OpenSearch"));
                            }
                            _ = sleep(retry_interval) => {}
                        }
                    }
                },
            }
        }
    }

    /// Attempt to connect to OpenSearch and check that the cluster answers.
    async fn try_connect_opensearch(url: &str) -> Result<OpenSearchProvider, IndexingError> {
        let search_provider = OpenSearchProvider::new(url, IndexSettings::default())
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch provider: {}", e))
            })?;

        search_provider
            .ping()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch did not answer: {}", e)))?;

        Ok(search_provider)
    }
}
