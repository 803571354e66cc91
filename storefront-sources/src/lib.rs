//! Paginated document sources for the storefront indexer.
//!
//! This crate provides:
//! - [`DocumentSource`] trait for abstracting upstream page fetches
//! - [`VsBridgeClient`] client for the commerce backend's bridge API
//! - [`StoryblokClient`] client for the headless CMS content delivery API
//! - [`MockDocumentSource`] mock source with pre-registered pages for tests
//! - [`RetryingSource`] wrapper retrying transient network failures
//! - [`DocumentSourceKind`] config enum for choosing between them
//!
//! ## Usage with DocumentSourceKind
//!
//! ```ignore
//! use storefront_sources::{DocumentSourceKind, RetryPolicy};
//!
//! let source = DocumentSourceKind::storyblok(config)
//!     .into_source(RetryPolicy::default(), cancel.clone())
//!     .await?;
//! let documents = source.get_documents(&ImportCursor::new("cms_storyblok", 1, 25)).await?;
//! ```

mod mock;
mod retry;
mod storyblok;
mod vsbridge;

pub use mock::MockDocumentSource;
pub use retry::{retry, RetryPolicy, RetryingSource};
pub use storyblok::{StoryblokClient, StoryblokConfig, DEFAULT_STORYBLOK_URL};
pub use vsbridge::{VsBridgeClient, VsBridgeConfig};

use std::collections::HashMap;
use std::error::Error as StdError;

use async_trait::async_trait;
use serde_json::Value;
use storefront_indexer_shared::{Document, ImportCursor};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// DNS, connect or timeout failure; worth retrying.
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    /// Retries exhausted, or a transport failure that retrying will not fix.
    #[error("infrastructure error after {attempts} attempt(s): {message}")]
    Infrastructure { attempts: u32, message: String },
    /// The upstream answered with a non-success application status.
    #[error("upstream status {code}: {message}")]
    Status { code: i64, message: String },
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether the retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        if is_transient_transport(&error) {
            return Self::TransientNetwork(error.to_string());
        }
        if error.is_decode() {
            return Self::UnexpectedPayload(error.to_string());
        }
        if let Some(status) = error.status() {
            return Self::Status {
                code: i64::from(status.as_u16()),
                message: error.to_string(),
            };
        }
        Self::Infrastructure {
            attempts: 1,
            message: error.to_string(),
        }
    }
}

/// Connect and timeout failures, plus name resolution failures reqwest reports
/// only through the error chain text.
fn is_transient_transport(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    let mut source: Option<&(dyn StdError + 'static)> = StdError::source(error);
    while let Some(cause) = source {
        let text = cause.to_string().to_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = StdError::source(cause);
    }
    false
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Fetches one page of an upstream collection.
///
/// A page shorter than `cursor.page_size` signals the last page; interpreting
/// that is left to the caller.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn get_documents(&self, cursor: &ImportCursor) -> Result<Vec<Document>>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

/// Turn a JSON array of objects into documents.
pub(crate) fn documents_from_array(items: Vec<Value>) -> Result<Vec<Document>> {
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(document) => Ok(document),
            other => Err(SourceError::UnexpectedPayload(format!(
                "item {} is not an object: {}",
                position, other
            ))),
        })
        .collect()
}

/// Configuration for the document source.
///
/// Use this to explicitly choose between the mock and the live upstreams.
#[derive(Debug, Clone)]
pub enum DocumentSourceKind {
    /// Pre-registered pages per entity type, starting at page 0.
    Mock(HashMap<String, Vec<Vec<Document>>>),
    /// The commerce backend's bridge API.
    VsBridge(VsBridgeConfig),
    /// The headless CMS.
    Storyblok(StoryblokConfig),
}

impl DocumentSourceKind {
    pub fn mock(pages: HashMap<String, Vec<Vec<Document>>>) -> Self {
        Self::Mock(pages)
    }

    pub fn vsbridge(config: VsBridgeConfig) -> Self {
        Self::VsBridge(config)
    }

    pub fn storyblok(config: StoryblokConfig) -> Self {
        Self::Storyblok(config)
    }

    /// Create the appropriate `DocumentSource`, wrapped in the retry policy.
    ///
    /// The bridge client authenticates here, once, so a bad login fails before any
    /// page is requested.
    pub async fn into_source(
        self,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Box<dyn DocumentSource>> {
        match self {
            DocumentSourceKind::Mock(pages) => {
                let source = MockDocumentSource::new();
                for (entity_type, entity_pages) in pages {
                    source.register_pages(&entity_type, entity_pages);
                }
                Ok(Box::new(RetryingSource::new(source, policy, cancel)))
            }
            DocumentSourceKind::VsBridge(config) => {
                let client = retry("vsbridge auth", &policy, &cancel, || {
                    VsBridgeClient::connect(config.clone())
                })
                .await?;
                Ok(Box::new(RetryingSource::new(client, policy, cancel)))
            }
            DocumentSourceKind::Storyblok(config) => {
                let client = StoryblokClient::new(config)?;
                Ok(Box::new(RetryingSource::new(client, policy, cancel)))
            }
        }
    }
}
