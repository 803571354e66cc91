//! Environment configuration for the indexer binary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use storefront_indexer_repository::{IndexConfig, DEFAULT_SELECTION_FILE};
use storefront_sources::{RetryPolicy, StoryblokConfig, VsBridgeConfig, DEFAULT_STORYBLOK_URL};
use tracing::warn;

use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index family prefix.
const DEFAULT_INDEX_PREFIX: &str = "vue_storefront_catalog";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

const DEFAULT_SOURCE_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_SOURCE_RETRY_DELAY_MS: u64 = 2000;

const DEFAULT_VSBRIDGE_AUTH_ENDPOINT: &str = "auth/admin";

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything the binary reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub opensearch_url: String,
    pub index: IndexConfig,
    pub selection_file: PathBuf,
    /// Directory of `<type>.json` mappings replacing the builtin catalog.
    pub mappings_dir: Option<PathBuf>,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    /// Set when `VSBRIDGE_URL` is.
    pub vsbridge: Option<VsBridgeConfig>,
    /// Set when `STORYBLOK_TOKEN` is.
    pub storyblok: Option<StoryblokConfig>,
    pub source_retry: RetryPolicy,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_PREFIX`: Index name prefix (default: vue_storefront_catalog)
    /// - `INDEX_ALIAS`: Public alias (default: the prefix)
    /// - `SELECTION_FILE`: Selected index file (default: var/selected-index.json)
    /// - `MAPPINGS_DIR`: Optional mappings directory
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `VSBRIDGE_URL`, `VSBRIDGE_API_KEY`, `VSBRIDGE_AUTH_ENDPOINT`,
    ///   `VSBRIDGE_USERNAME`, `VSBRIDGE_PASSWORD`, `VSBRIDGE_<ENTITY>_ENDPOINT`
    /// - `STORYBLOK_URL`, `STORYBLOK_TOKEN`, `STORYBLOK_COUNTRY`
    /// - `SOURCE_RETRY_ATTEMPTS` (default: 5), `SOURCE_RETRY_DELAY_MS` (default: 2000)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let opensearch_url =
            get("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let prefix = get("INDEX_PREFIX").unwrap_or_else(|| DEFAULT_INDEX_PREFIX.to_string());
        let alias = get("INDEX_ALIAS").unwrap_or_else(|| prefix.clone());

        let retry_interval = parse_number(get("OPENSEARCH_RETRY_INTERVAL_SECS"), "OPENSEARCH_RETRY_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);
        let attempts = parse_number(get("SOURCE_RETRY_ATTEMPTS"), "SOURCE_RETRY_ATTEMPTS")?
            .unwrap_or(DEFAULT_SOURCE_RETRY_ATTEMPTS);
        let delay_ms = parse_number(get("SOURCE_RETRY_DELAY_MS"), "SOURCE_RETRY_DELAY_MS")?
            .unwrap_or(DEFAULT_SOURCE_RETRY_DELAY_MS);

        let vsbridge = match get("VSBRIDGE_URL") {
            Some(url) => {
                let api_key = get("VSBRIDGE_API_KEY").ok_or_else(|| {
                    IndexingError::config("VSBRIDGE_API_KEY is required when VSBRIDGE_URL is set")
                })?;
                let mut config = VsBridgeConfig::new(url, api_key);
                config.auth_endpoint = get("VSBRIDGE_AUTH_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_VSBRIDGE_AUTH_ENDPOINT.to_string());
                config.username = get("VSBRIDGE_USERNAME");
                config.password = get("VSBRIDGE_PASSWORD");
                config.endpoints = endpoint_overrides(config.endpoints, &get);
                Some(config)
            }
            None => None,
        };

        let storyblok = get("STORYBLOK_TOKEN").map(|token| {
            StoryblokConfig::new(token, get("STORYBLOK_COUNTRY").unwrap_or_default())
                .with_base_url(
                    get("STORYBLOK_URL").unwrap_or_else(|| DEFAULT_STORYBLOK_URL.to_string()),
                )
        });

        Ok(Self {
            opensearch_url,
            index: IndexConfig::new(prefix, alias),
            selection_file: get("SELECTION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SELECTION_FILE)),
            mappings_dir: get("MAPPINGS_DIR").map(PathBuf::from),
            connection_mode: ConnectionMode::parse(get("OPENSEARCH_CONNECTION_MODE")),
            retry_interval: Duration::from_secs(retry_interval),
            vsbridge,
            storyblok,
            source_retry: RetryPolicy::new(attempts, Duration::from_millis(delay_ms)),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
) -> Result<Option<T>, IndexingError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| IndexingError::config(format!("{} is not a number: {}", key, raw)))
        })
        .transpose()
}

/// Apply `VSBRIDGE_<ENTITY>_ENDPOINT` overrides to the known entity types.
fn endpoint_overrides<G>(mut endpoints: HashMap<String, String>, get: &G) -> HashMap<String, String>
where
    G: Fn(&str) -> Option<String>,
{
    for (entity_type, endpoint) in endpoints.iter_mut() {
        let key = format!("VSBRIDGE_{}_ENDPOINT", entity_type.to_uppercase());
        if let Some(value) = get(&key) {
            *endpoint = value;
        }
    }
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, IndexingError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.opensearch_url, "http://localhost:9200");
        assert_eq!(config.index.prefix, "vue_storefront_catalog");
        assert_eq!(config.index.alias, "vue_storefront_catalog");
        assert_eq!(config.selection_file, PathBuf::from("var/selected-index.json"));
        assert_eq!(config.connection_mode, ConnectionMode::Retry);
        assert_eq!(config.retry_interval, Duration::from_secs(15));
        assert_eq!(config.source_retry, RetryPolicy::default());
        assert!(config.vsbridge.is_none());
        assert!(config.storyblok.is_none());
    }

    #[test]
    fn test_vsbridge_with_overrides() {
        let config = config_from(&[
            ("VSBRIDGE_URL", "https://shop.example/vsbridge"),
            ("VSBRIDGE_API_KEY", "key"),
            ("VSBRIDGE_USERNAME", "admin"),
            ("VSBRIDGE_PASSWORD", "pw"),
            ("VSBRIDGE_PRODUCT_ENDPOINT", "catalog/products"),
            ("OPENSEARCH_CONNECTION_MODE", "FAIL-FAST"),
        ])
        .unwrap();

        let vsbridge = config.vsbridge.unwrap();
        assert_eq!(vsbridge.auth_endpoint, "auth/admin");
        assert_eq!(vsbridge.username.as_deref(), Some("admin"));
        assert_eq!(vsbridge.endpoints["product"], "catalog/products");
        assert_eq!(vsbridge.endpoints["category"], "categories/index");
        assert_eq!(config.connection_mode, ConnectionMode::FailFast);
    }

    #[test]
    fn test_vsbridge_requires_api_key() {
        let err = config_from(&[("VSBRIDGE_URL", "https://shop.example")]).unwrap_err();
        assert!(matches!(err, IndexingError::ConfigError(_)));
    }

    #[test]
    fn test_storyblok_and_retry_policy() {
        let config = config_from(&[
            ("STORYBLOK_TOKEN", "tok"),
            ("STORYBLOK_COUNTRY", "AT"),
            ("SOURCE_RETRY_ATTEMPTS", "3"),
            ("SOURCE_RETRY_DELAY_MS", "10"),
            ("INDEX_PREFIX", "shop"),
            ("INDEX_ALIAS", "shop_live"),
        ])
        .unwrap();

        let storyblok = config.storyblok.unwrap();
        assert_eq!(storyblok.country, "AT");
        assert_eq!(storyblok.base_url, DEFAULT_STORYBLOK_URL);
        assert_eq!(config.source_retry.max_attempts, 3);
        assert_eq!(config.source_retry.delay, Duration::from_millis(10));
        assert_eq!(config.index, IndexConfig::new("shop", "shop_live"));
    }

    #[test]
    fn test_invalid_number() {
        assert!(config_from(&[("SOURCE_RETRY_ATTEMPTS", "many")]).is_err());
    }
}
