//! Request and response types for index operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine answer to a mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub acknowledged: bool,
}

impl Acknowledgment {
    pub fn acknowledged() -> Self {
        Self { acknowledged: true }
    }

    pub fn rejected() -> Self {
        Self {
            acknowledged: false,
        }
    }
}

/// One row of the engine's index listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexListing {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Handle to a background copy started by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexTask {
    /// Engine task id, e.g. `oTUltX4IQMOUUVeiohTt8A:12345`.
    pub task_id: String,
    pub source: String,
    pub destination: String,
}

/// Progress of an engine task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub completed: bool,
    /// Documents the task will process, when the engine reports it.
    pub total: Option<u64>,
    pub created: Option<u64>,
    pub updated: Option<u64>,
    /// Number of per-document failures reported in the task response.
    pub failures: usize,
}

/// How the operator designates an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCriterion {
    /// Numeric version id.
    Id(u64),
    /// Full index name.
    Name(String),
    /// Highest id in the catalog.
    Latest,
    /// The index the public alias resolves to.
    Aliased,
    /// The operator's persisted selection.
    Selected,
}

impl std::fmt::Display for IndexCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexCriterion::Id(id) => write!(f, "id {}", id),
            IndexCriterion::Name(name) => write!(f, "name {}", name),
            IndexCriterion::Latest => f.write_str("latest"),
            IndexCriterion::Aliased => f.write_str("aliased"),
            IndexCriterion::Selected => f.write_str("selected"),
        }
    }
}
