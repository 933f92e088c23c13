//! HTTP client for a parameter and secret sidecar
//!
//! The sidecar exposes two read endpoints:
//!
//! - `GET {endpoint}/parameters?name=<path>&with_decryption=<bool>` returning
//!   `{"value": "..."}`
//! - `GET {endpoint}/secrets/<id>` returning `{"secret_string": "..."}`
//!
//! Non-success responses are classified by status and by any error code in
//! the body.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use url::Url;

use crate::core::{ParameterBackend, SecretBackend};
use crate::error::{DomainError, ProviderError, Result};

/// User agent identifying this layer to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    pub app_name: String,
    pub version: String,
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "univoice".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some(env!("CARGO_PKG_NAME").to_string()),
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Build an HTTP client with the standard user agent and a per-request timeout
pub fn build_http_client(user_agent: Option<UserAgent>, timeout: Duration) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    let ua = user_agent.unwrap_or_default().to_string();

    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&ua)
            .map_err(|e| DomainError::internal(format!("Invalid user agent: {}", e), None))?,
    );

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| DomainError::internal(format!("Failed to build HTTP client: {}", e), None))
}

#[derive(Debug, Deserialize)]
struct ParameterResponse {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    secret_string: String,
}

/// Parameter and secret backend speaking to the sidecar over HTTP
#[derive(Debug, Clone)]
pub struct HttpConfigBackend {
    client: Client,
    base_url: Url,
}

impl HttpConfigBackend {
    /// Create a backend for the sidecar at `endpoint`
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = build_http_client(None, timeout)?;
        Self::with_client(client, endpoint)
    }

    /// Create a backend sharing an existing HTTP client
    pub fn with_client(client: Client, endpoint: &str) -> Result<Self> {
        let base_url = Url::parse(endpoint).map_err(|e| {
            DomainError::internal(format!("Invalid endpoint URL: {}", e), None)
                .with_detail("endpoint", endpoint)
        })?;

        if base_url.cannot_be_a_base() {
            return Err(DomainError::internal("Endpoint URL cannot be a base", None)
                .with_detail("endpoint", endpoint));
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, ProviderError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), &body));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ParameterBackend for HttpConfigBackend {
    async fn get_parameter(&self, path: &str, with_decryption: bool) -> std::result::Result<String, ProviderError> {
        let url = self.url_for(&["parameters"]);
        let request = self
            .client
            .get(url)
            .query(&[("name", path), ("with_decryption", if with_decryption { "true" } else { "false" })]);

        let body: ParameterResponse = self.fetch(request).await?;
        Ok(body.value)
    }
}

#[async_trait]
impl SecretBackend for HttpConfigBackend {
    async fn get_secret_value(&self, secret_id: &str) -> std::result::Result<String, ProviderError> {
        let url = self.url_for(&["secrets", secret_id]);
        let body: SecretResponse = self.fetch(self.client.get(url)).await?;
        Ok(body.secret_string)
    }
}
