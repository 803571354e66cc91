//! This module defines the core data structures used across the storefront indexer.

pub mod document;
pub mod import_cursor;
pub mod index_version;
pub mod mapping;
