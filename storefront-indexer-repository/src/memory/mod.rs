//! In-memory implementations of the repository interfaces.
//!
//! Used by tests across the workspace.

mod engine;
mod selection;

pub use engine::{EngineOperation, InMemorySearchEngine};
pub use selection::InMemorySelectionRepository;
