//! Reindex orchestration: copy the current index into a fresh version and move the
//! public alias to it.
//!
//! The copy runs in the engine's background; the alias is moved as soon as the copy
//! is accepted. Progress can be followed with [`ReindexOrchestrator::task_status`].

use std::sync::Arc;

use storefront_indexer_shared::IndexVersion;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::catalog::IndexCatalog;
use crate::errors::{ReindexError, ReindexStage, SearchIndexError};
use crate::interfaces::SearchIndexProvider;
use crate::lifecycle::IndexLifecycleManager;
use crate::types::{IndexCriterion, ReindexTask, TaskStatus};
use crate::utils::cancellable;

/// A reindex run that reached `AliasMoved`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexOutcome {
    pub source: IndexVersion,
    pub destination: IndexVersion,
    pub task: ReindexTask,
}

/// Drives `Start -> DestCreated -> MappingsApplied -> CopyTriggered -> AliasMoved`.
pub struct ReindexOrchestrator {
    catalog: Arc<IndexCatalog>,
    lifecycle: Arc<IndexLifecycleManager>,
    provider: Arc<dyn SearchIndexProvider>,
    cancel: CancellationToken,
}

impl ReindexOrchestrator {
    pub fn new(
        lifecycle: Arc<IndexLifecycleManager>,
        provider: Arc<dyn SearchIndexProvider>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog: lifecycle.catalog().clone(),
            lifecycle,
            provider,
            cancel,
        }
    }

    /// Copy `source` (the aliased index when `None`) into a new version and alias it.
    ///
    /// The source index is never deleted. A failed mapping step or a rejected copy
    /// removes the new version; once the copy was accepted nothing is rolled back and
    /// the error carries the task handle.
    #[instrument(skip(self))]
    pub async fn reindex(
        &self,
        source: Option<IndexCriterion>,
    ) -> Result<ReindexOutcome, ReindexError> {
        let criterion = source.unwrap_or(IndexCriterion::Aliased);
        let source = self
            .catalog
            .resolve(&criterion)
            .await
            .map_err(|e| ReindexError::new(ReindexStage::Start, e))?;

        let destination = self
            .lifecycle
            .create_next_index()
            .await
            .map_err(|e| ReindexError::new(ReindexStage::Start, e))?;
        info!(source = %source.name, destination = %destination.name, "Destination created");

        self.lifecycle
            .apply_mappings(&destination.name)
            .await
            .map_err(|e| ReindexError::new(ReindexStage::DestCreated, e))?;

        let task = match cancellable(
            &self.cancel,
            self.provider.reindex(&source.name, &destination.name),
        )
        .await
        {
            Ok(task) => task,
            Err(e) => {
                error!(
                    source = %source.name,
                    destination = %destination.name,
                    error = %e,
                    "Copy rejected, deleting destination"
                );
                self.lifecycle.discard_index(&destination.name).await;
                return Err(ReindexError::new(ReindexStage::MappingsApplied, e));
            }
        };

        if let Err(e) = self.lifecycle.set_alias(&destination.name).await {
            error!(
                destination = %destination.name,
                task_id = %task.task_id,
                error = %e,
                "Alias not moved; copy keeps running"
            );
            return Err(ReindexError::new(ReindexStage::CopyTriggered, e).with_task(task));
        }

        info!(
            source = %source.name,
            destination = %destination.name,
            task_id = %task.task_id,
            "Reindex started and alias moved"
        );
        Ok(ReindexOutcome {
            source,
            destination,
            task,
        })
    }

    /// Poll a background copy.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus, SearchIndexError> {
        cancellable(&self.cancel, self.provider.task_status(task_id)).await
    }
}
