//! Index naming configuration shared by the catalog and lifecycle services.

/// Prefix and public alias of the managed index family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Index names are `<prefix>_<id>`.
    pub prefix: String,
    /// The alias search clients read from.
    pub alias: String,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The index name prefix
    /// * `alias` - The public alias name
    pub fn new(prefix: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            alias: alias.into(),
        }
    }

    /// Use the prefix itself as the alias name.
    pub fn with_prefix_alias(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            alias: prefix.clone(),
            prefix,
        }
    }

    /// Wildcard pattern matching every index of the family.
    pub fn index_pattern(&self) -> String {
        format!("{}_*", self.prefix)
    }
}
