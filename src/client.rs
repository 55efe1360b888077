//! Remote API capability
//!
//! The mirror never talks HTTP directly: listings go through
//! [`ApiClient::api`] and raw byte transfers through [`ApiClient::request`].
//! Failures come back as a structured [`ApiError`] so callers can tell an
//! authorization rejection or an expired link apart from a transient failure
//! without inspecting error text.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Path prefix of the JSON API on the media server
const API_PREFIX: &str = "api/v2/";

/// Classified failure of a remote call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server refused access (HTTP 403)
    #[error("HTTP 403 forbidden: {url}")]
    Forbidden {
        /// Requested URL
        url: String,
    },

    /// The resource no longer exists at this URL (HTTP 410)
    #[error("HTTP 410 gone: {url}")]
    Gone {
        /// Requested URL
        url: String,
    },

    /// Any other non-success HTTP status
    #[error("HTTP {code}")]
    Status {
        /// HTTP status code
        code: u16,
    },

    /// Connection, timeout or protocol failure before a status was received
    #[error("transport failure for {url}: {reason}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying error message
        reason: String,
    },

    /// Reading the body or writing it locally failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response body was not the expected JSON
    #[error("invalid response payload: {0}")]
    Decode(String),

    /// The URL could not be built
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Map an HTTP status onto its classified error, `None` for success
    pub fn from_status(code: u16, url: &str) -> Option<Self> {
        match code {
            200..=299 => None,
            403 => Some(ApiError::Forbidden {
                url: url.to_string(),
            }),
            410 => Some(ApiError::Gone {
                url: url.to_string(),
            }),
            code => Some(ApiError::Status { code }),
        }
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if let Some(status) = e.status()
            && let Some(err) = Self::from_status(status.as_u16(), url)
        {
            return err;
        }
        if e.is_decode() {
            return ApiError::Decode(e.to_string());
        }
        ApiError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// A streaming response whose status has already been checked
pub struct RemoteResponse {
    url: String,
    inner: reqwest::Response,
}

impl RemoteResponse {
    #[cfg(test)]
    fn status(&self) -> reqwest::StatusCode {
        self.inner.status()
    }

    /// Stream the body into `writer`, returning the number of bytes written
    pub async fn write_to<W>(mut self, writer: &mut W) -> Result<u64, ApiError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut written = 0u64;
        while let Some(chunk) = self
            .inner
            .chunk()
            .await
            .map_err(|e| ApiError::from_reqwest(&self.url, e))?
        {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Read the whole body into memory
    pub async fn into_bytes(self) -> Result<Vec<u8>, ApiError> {
        let url = self.url;
        self.inner
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ApiError::from_reqwest(&url, e))
    }
}

/// Capability the mirror uses to reach the remote server
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Call a JSON endpoint identified by `endpoint` (path and query relative to the API root)
    async fn api(&self, endpoint: &str, timeout: Duration) -> Result<Value, ApiError>;

    /// Open a streaming GET on an absolute URL
    ///
    /// Non-success statuses are returned as classified errors.
    async fn request(&self, url: &str, timeout: Duration) -> Result<RemoteResponse, ApiError>;
}

/// [`ApiClient`] backed by reqwest, authenticating with an API key
#[derive(Clone)]
pub struct MediaServerClient {
    http: reqwest::Client,
    api_root: url::Url,
    api_key: String,
}

impl MediaServerClient {
    /// Create a client for `server_url`
    pub fn new(server_url: &str, client_id: &str, api_key: &str) -> Result<Self, ApiError> {
        let base = format!("{}/", server_url.trim_end_matches('/'));
        let api_root = url::Url::parse(&base)
            .and_then(|u| u.join(API_PREFIX))
            .map_err(|e| ApiError::InvalidUrl(format!("{server_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(client_id)
            .build()
            .map_err(|e| ApiError::Transport {
                url: server_url.to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_root,
            api_key: api_key.to_string(),
        })
    }

    /// Absolute URL of an API endpoint, carrying the API key
    pub fn endpoint_url(&self, endpoint: &str) -> Result<url::Url, ApiError> {
        let mut url = self
            .api_root
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{endpoint}: {e}")))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl ApiClient for MediaServerClient {
    async fn api(&self, endpoint: &str, timeout: Duration) -> Result<Value, ApiError> {
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!(endpoint, "API call");

        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(endpoint, e))?;

        if let Some(err) = ApiError::from_status(response.status().as_u16(), endpoint) {
            return Err(err);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Decode(format!("{endpoint}: {e}")))
    }

    async fn request(&self, url: &str, timeout: Duration) -> Result<RemoteResponse, ApiError> {
        let parsed =
            url::Url::parse(url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))?;

        let mut builder = self.http.get(parsed.clone()).timeout(timeout);
        // Resources hosted on the API server need the key; foreign CDNs must not see it
        if parsed.host_str() == self.api_root.host_str() {
            builder = builder.query(&[("api_key", self.api_key.as_str())]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(url, e))?;

        if let Some(err) = ApiError::from_status(response.status().as_u16(), url) {
            return Err(err);
        }

        Ok(RemoteResponse {
            url: url.to_string(),
            inner: response,
        })
    }
}
