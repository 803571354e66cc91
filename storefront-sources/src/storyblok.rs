//! Client for the headless CMS content delivery API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use storefront_indexer_shared::{Document, ImportCursor};
use tracing::{debug, error, instrument};

use crate::{documents_from_array, DocumentSource, Result, SourceError};

pub const DEFAULT_STORYBLOK_URL: &str = "https://api.storyblok.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct StoryblokConfig {
    pub base_url: String,
    /// Access token for published content.
    pub token: String,
    /// Stories are scoped to `<country>/`, lowercased.
    pub country: String,
}

impl StoryblokConfig {
    pub fn new(token: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_STORYBLOK_URL.to_string(),
            token: token.into(),
            country: country.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

pub struct StoryblokClient {
    config: StoryblokConfig,
    client: ReqwestClient,
}

impl StoryblokClient {
    pub fn new(config: StoryblokConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(SourceError::Configuration(
                "storyblok access token is empty".into(),
            ));
        }
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn stories_url(&self) -> String {
        format!("{}/cdn/stories", self.config.base_url.trim_end_matches('/'))
    }
}

/// Extract `stories`. The API answers a miss with `["This record could not be
/// found"]` instead of an empty array.
fn parse_stories(body: Value) -> Result<Vec<Document>> {
    let Value::Object(mut fields) = body else {
        return Err(SourceError::UnexpectedPayload("response is not an object".into()));
    };
    match fields.remove("stories") {
        Some(Value::Array(stories)) => {
            if let Some(Value::String(message)) = stories.first() {
                return Err(SourceError::UnexpectedPayload(format!(
                    "could not get stories: {}",
                    message
                )));
            }
            documents_from_array(stories)
        }
        Some(other) => Err(SourceError::UnexpectedPayload(format!(
            "stories is not an array: {}",
            other
        ))),
        None => Err(SourceError::UnexpectedPayload(
            "response has no stories".into(),
        )),
    }
}

#[async_trait]
impl DocumentSource for StoryblokClient {
    #[instrument(skip(self), fields(entity_type = %cursor.entity_type, page = cursor.page))]
    async fn get_documents(&self, cursor: &ImportCursor) -> Result<Vec<Document>> {
        let starts_with = format!("{}/", self.config.country.to_lowercase());
        let page = cursor.page.to_string();
        let per_page = cursor.page_size.to_string();

        let response = self
            .client
            .get(self.stories_url())
            .query(&[
                ("token", self.config.token.as_str()),
                ("version", "published"),
                ("starts_with", starts_with.as_str()),
                ("page", page.as_str()),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Storyblok request failed");
            return Err(SourceError::Status {
                code: i64::from(status.as_u16()),
                message: error_body,
            });
        }

        let stories = parse_stories(response.json().await?)?;
        debug!(count = stories.len(), "Fetched stories");
        Ok(stories)
    }

    fn name(&self) -> &str {
        "storyblok"
    }
}
