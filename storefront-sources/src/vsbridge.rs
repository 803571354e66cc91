//! Client for the commerce backend's bridge API.
//!
//! The bridge exposes one listing endpoint per entity type, each answering
//! `{ "code": 200, "result": [...] }` (some deployments send `statusCode` instead
//! of `code`). Requests carry an API token obtained once at connect time.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::{json, Value};
use storefront_indexer_shared::{Document, ImportCursor};
use tracing::{debug, error, info, instrument};

use crate::{documents_from_array, DocumentSource, Result, SourceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Listing endpoints of a stock bridge installation, relative to the base URL.
const DEFAULT_ENDPOINTS: &[(&str, &str)] = &[
    ("attribute", "attributes/index"),
    ("taxrule", "taxrules/index"),
    ("category", "categories/index"),
    ("product", "products/index"),
    ("cms_page", "cms/pages"),
    ("cms_block", "cms/blocks"),
    ("cms_hierarchy", "cms/hierarchy"),
];

#[derive(Debug, Clone)]
pub struct VsBridgeConfig {
    pub base_url: String,
    pub api_key: String,
    pub auth_endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Entity type -> listing endpoint.
    pub endpoints: HashMap<String, String>,
}

impl VsBridgeConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            auth_endpoint: "auth/admin".to_string(),
            username: None,
            password: None,
            endpoints: Self::default_endpoints(),
        }
    }

    pub fn default_endpoints() -> HashMap<String, String> {
        DEFAULT_ENDPOINTS
            .iter()
            .map(|(entity, endpoint)| (entity.to_string(), endpoint.to_string()))
            .collect()
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_endpoint(mut self, entity_type: &str, endpoint: impl Into<String>) -> Self {
        self.endpoints
            .insert(entity_type.to_string(), endpoint.into());
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

/// An authenticated bridge client. The token lives here and nowhere else.
pub struct VsBridgeClient {
    config: VsBridgeConfig,
    token: String,
    client: ReqwestClient,
}

impl std::fmt::Debug for VsBridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsBridgeClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl VsBridgeClient {
    /// Authenticate and build a client.
    ///
    /// Without credentials the configured API key is used as the token.
    #[instrument(skip(config), fields(base_url = %config.base_url))]
    pub async fn connect(config: VsBridgeConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;

        let token = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                authenticate(&client, &config, username, password).await?
            }
            _ => {
                debug!("No bridge credentials configured, using the API key");
                config.api_key.clone()
            }
        };

        Ok(Self {
            config,
            token,
            client,
        })
    }

    fn endpoint_for(&self, entity_type: &str) -> Result<&str> {
        self.config
            .endpoints
            .get(entity_type)
            .map(String::as_str)
            .ok_or_else(|| {
                SourceError::Configuration(format!("no endpoint defined for {}", entity_type))
            })
    }
}

async fn authenticate(
    client: &ReqwestClient,
    config: &VsBridgeConfig,
    username: &str,
    password: &str,
) -> Result<String> {
    let response = client
        .post(config.url(&config.auth_endpoint))
        .query(&[("apikey", config.api_key.as_str())])
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, "Bridge authentication rejected");
        return Err(SourceError::Authentication(format!(
            "status {}: {}",
            status, error_body
        )));
    }

    let body: Value = response.json().await?;
    match (application_code(&body), body.get("result")) {
        (Some(200), Some(Value::String(token))) if !token.is_empty() => {
            info!("Authenticated against the bridge");
            Ok(token.clone())
        }
        (code, result) => {
            error!(code = ?code, result = ?result, "Bridge authentication failed");
            Err(SourceError::Authentication(format!(
                "code {:?}: {}",
                code,
                result.cloned().unwrap_or(Value::Null)
            )))
        }
    }
}

/// `code`, or `statusCode` when the deployment uses that spelling.
fn application_code(body: &Value) -> Option<i64> {
    body.get("code")
        .or_else(|| body.get("statusCode"))
        .and_then(Value::as_i64)
}

/// Turn a listing response into documents; a non-200 code is fatal.
fn parse_listing(body: Value) -> Result<Vec<Document>> {
    let code = application_code(&body).ok_or_else(|| {
        SourceError::UnexpectedPayload("response carries neither code nor statusCode".into())
    })?;

    let Value::Object(mut fields) = body else {
        return Err(SourceError::UnexpectedPayload("response is not an object".into()));
    };
    let result = fields.remove("result").unwrap_or(Value::Null);

    if code != 200 {
        return Err(SourceError::Status {
            code,
            message: result.to_string(),
        });
    }

    match result {
        Value::Array(items) => documents_from_array(items),
        other => Err(SourceError::UnexpectedPayload(format!(
            "result is not an array: {}",
            other
        ))),
    }
}

#[async_trait]
impl DocumentSource for VsBridgeClient {
    #[instrument(skip(self), fields(entity_type = %cursor.entity_type, page = cursor.page))]
    async fn get_documents(&self, cursor: &ImportCursor) -> Result<Vec<Document>> {
        let endpoint = self.endpoint_for(&cursor.entity_type)?;
        let page = cursor.page.to_string();
        let page_size = cursor.page_size.to_string();

        let response = self
            .client
            .get(self.config.url(endpoint))
            .query(&[
                ("apikey", self.token.as_str()),
                ("type", cursor.entity_type.as_str()),
                ("page", page.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, endpoint, "Bridge request failed");
            return Err(SourceError::Status {
                code: i64::from(status.as_u16()),
                message: error_body,
            });
        }

        let documents = parse_listing(response.json().await?)?;
        debug!(count = documents.len(), "Fetched bridge page");
        Ok(documents)
    }

    fn name(&self) -> &str {
        "vsbridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> VsBridgeConfig {
        VsBridgeConfig::new(format!("{}/vsbridge", server.uri()), "secret")
            .with_credentials("admin", "pw")
    }

    async fn mount_auth(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/vsbridge/auth/admin"))
            .and(query_param("apikey", "secret"))
            .and(body_json(json!({ "username": "admin", "password": "pw" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "code": 200, "result": token })),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_listing() {
        let documents =
            parse_listing(json!({ "code": 200, "result": [{ "id": 1 }, { "id": 2 }] })).unwrap();
        assert_eq!(documents.len(), 2);

        let documents = parse_listing(json!({ "statusCode": 200, "result": [] })).unwrap();
        assert!(documents.is_empty());
    }

    #[test]
    fn test_parse_listing_non_200_is_fatal() {
        let err = parse_listing(json!({ "code": 500, "result": "Internal error" })).unwrap_err();
        assert!(matches!(err, SourceError::Status { code: 500, .. }));
        assert!(!err.is_transient());

        let err = parse_listing(json!({ "code": 200, "result": "nope" })).unwrap_err();
        assert!(matches!(err, SourceError::UnexpectedPayload(_)));
    }

    #[tokio::test]
    async fn test_connect_and_fetch_page() {
        let server = MockServer::start().await;
        mount_auth(&server, "token-1").await;

        Mock::given(method("GET"))
            .and(path("/vsbridge/categories/index"))
            .and(query_param("apikey", "token-1"))
            .and(query_param("type", "category"))
            .and(query_param("page", "2"))
            .and(query_param("pageSize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200,
                "result": [{ "id": 7, "name": "Lamps" }]
            })))
            .mount(&server)
            .await;

        let client = VsBridgeClient::connect(config_for(&server)).await.unwrap();
        let documents = client
            .get_documents(&ImportCursor::new("category", 2, 10))
            .await
            .unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["name"], "Lamps");
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vsbridge/auth/admin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "code": 401, "result": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let err = VsBridgeClient::connect(config_for(&server)).await.unwrap_err();
        assert!(matches!(err, SourceError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_configuration_error() {
        let server = MockServer::start().await;
        mount_auth(&server, "token-1").await;

        let client = VsBridgeClient::connect(config_for(&server)).await.unwrap();
        let err = client
            .get_documents(&ImportCursor::new("review", 0, 25))
            .await
            .unwrap_err();

        match err {
            SourceError::Configuration(message) => assert!(message.contains("review")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        mount_auth(&server, "token-1").await;
        Mock::given(method("GET"))
            .and(path("/vsbridge/products/index"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = VsBridgeClient::connect(config_for(&server)).await.unwrap();
        let err = client
            .get_documents(&ImportCursor::new("product", 0, 25))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Status { code: 503, .. }));
    }
}
