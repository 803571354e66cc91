//! Versioned index names and the pointers that refer to them.
//!
//! Every physical index is named `<prefix>_<id>`, where `id` is a positive integer
//! that grows monotonically with each new version. The numeric suffix is the only
//! ordering the system relies on; the "current" index is whatever the public alias
//! points at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned instance of a search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexVersion {
    /// Full index name, `<prefix>_<id>`.
    pub name: String,
    /// Numeric version parsed from the name's suffix.
    pub id: u64,
    /// Creation time as reported by the engine, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl IndexVersion {
    /// Build the version for `prefix` and `id`.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_indexer_shared::IndexVersion;
    ///
    /// let version = IndexVersion::new("shop", 4);
    /// assert_eq!(version.name, "shop_4");
    /// ```
    pub fn new(prefix: &str, id: u64) -> Self {
        Self {
            name: Self::format_name(prefix, id),
            id,
            created_at: None,
        }
    }

    /// Parse an engine index name into a version of `prefix`.
    ///
    /// Returns `None` when the name belongs to another prefix or the suffix is not
    /// a plain decimal number (e.g. `shop_backup` or `shop_4a`).
    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        let suffix = name.strip_prefix(prefix)?.strip_prefix('_')?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = suffix.parse::<u64>().ok()?;
        Some(Self {
            name: name.to_string(),
            id,
            created_at: None,
        })
    }

    /// Attach the engine-reported creation time.
    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Format the index name for `prefix` and `id`.
    pub fn format_name(prefix: &str, id: u64) -> String {
        format!("{}_{}", prefix, id)
    }
}

/// The operator's persisted index choice.
///
/// This record is decoupled from engine state: it may refer to an index that has
/// since been deleted, which callers detect by cross-checking the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedIndexRecord {
    pub name: String,
    pub id: u64,
}

impl From<&IndexVersion> for SelectedIndexRecord {
    fn from(version: &IndexVersion) -> Self {
        Self {
            name: version.name.clone(),
            id: version.id,
        }
    }
}
