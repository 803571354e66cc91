//! Interface definitions for the repository.
//!
//! This module defines the abstract `SearchIndexProvider` and `SelectionRepository`
//! traits that allow for dependency injection and swappable implementations.

mod search_index_provider;
mod selection_repository;

pub use search_index_provider::SearchIndexProvider;
pub use selection_repository::SelectionRepository;
