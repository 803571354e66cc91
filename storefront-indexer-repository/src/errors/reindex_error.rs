//! Reindex failure reporting.

use std::fmt;

use thiserror::Error;

use crate::errors::SearchIndexError;
use crate::types::ReindexTask;

/// Progress of a reindex run.
///
/// A failure is reported with the last stage that was reached, so `DestCreated`
/// means the destination exists but its mappings could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexStage {
    Start,
    DestCreated,
    MappingsApplied,
    CopyTriggered,
    AliasMoved,
}

impl fmt::Display for ReindexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReindexStage::Start => "start",
            ReindexStage::DestCreated => "destination created",
            ReindexStage::MappingsApplied => "mappings applied",
            ReindexStage::CopyTriggered => "copy triggered",
            ReindexStage::AliasMoved => "alias moved",
        };
        f.write_str(name)
    }
}

/// A reindex run that stopped before moving the alias.
///
/// When the copy was already triggered, `task` carries its handle so an operator
/// can follow up; nothing is rolled back past that point.
#[derive(Debug, Clone, Error)]
#[error("Reindex failed after stage '{stage}': {source}")]
pub struct ReindexError {
    pub stage: ReindexStage,
    #[source]
    pub source: SearchIndexError,
    pub task: Option<ReindexTask>,
}

impl ReindexError {
    pub fn new(stage: ReindexStage, source: SearchIndexError) -> Self {
        Self {
            stage,
            source,
            task: None,
        }
    }

    pub fn with_task(mut self, task: ReindexTask) -> Self {
        self.task = Some(task);
        self
    }
}
