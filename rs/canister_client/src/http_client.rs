//! The transport boundary and its reqwest based implementation.

use crate::error::{AgentError, AgentResult};
use async_trait::async_trait;
use http::{Method, StatusCode};
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default timeout of a single HTTP round-trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP request relative to the replica's base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without a leading slash, e.g. `api/v2/status`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: vec![],
            body: vec![],
        }
    }

    /// A `POST` of a CBOR body.
    pub fn post_cbor(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            headers: vec![("Content-Type".to_string(), "application/cbor".to_string())],
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Performs one request/response round-trip with the replica. Retries, if
/// any, are left to the caller.
#[automock]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> AgentResult<HttpResponse>;
}

/// Basic-auth credentials for replicas behind an authenticating proxy.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

/// A [`Transport`] talking HTTP(S) to a replica at a fixed base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    url: Url,
    // Cloning a reqwest client shares its connection pool.
    client: reqwest::Client,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl ReqwestTransport {
    /// `url` is the replica's base URL. It should NOT contain a path like
    /// "/api/v2/canister/_/call", but a port if needed.
    pub fn new(url: Url) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::new_with_client(url, client))
    }

    /// Same as above except that it reuses a pre-existing client.
    pub fn new_with_client(url: Url, client: reqwest::Client) -> Self {
        Self {
            url,
            client,
            credentials: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn build_url(&self, path: &str) -> AgentResult<Url> {
        self.url.join(path).map_err(|e| {
            AgentError::Transport(format!("failed to create URL for {}: {}", path, e))
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: HttpRequest) -> AgentResult<HttpResponse> {
        let url = self.build_url(&request.path)?;
        let mut builder = self
            .client
            .request(request.method, url.clone())
            .timeout(self.timeout);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.name, Some(&credentials.password));
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            AgentError::Transport(format!(
                "failed to read the response body from {}: {}",
                url, e
            ))
        })?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
