//! OpenSearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch (or a wire-compatible Elasticsearch) as the backend.

mod index_settings;
mod provider;

pub use index_settings::IndexSettings;
pub use provider::OpenSearchProvider;
