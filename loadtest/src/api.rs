//! Transport seam between sessions and the API under test
//!
//! Sessions only see [`AuthApi`]; [`HttpAuthApi`] is the reqwest-backed
//! implementation used by the binary and integration tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors raised before a response status is available
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Paths of the three authentication endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub register: String,
    pub login: String,
    pub logout: String,
}

/// Raw response: status plus undecoded body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// A single POST against the API under test.
///
/// `body == None` sends an empty body; `bearer` adds
/// `Authorization: Bearer <token>`.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed [`AuthApi`] sharing one connection pool across sessions
#[derive(Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAuthApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(200)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Client(err)
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        Ok(ApiResponse { status, body })
    }
}
