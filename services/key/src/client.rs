//! HTTP client for the key service gateway.
//!
//! Error responses are decoded back into [`KeyError`] by status code, so
//! callers can branch on [`ErrorKind`] exactly as in-process callers do.

use crate::error::{ErrorKind, KeyError};
use crate::gateway::error::kind_for;
use crate::key::Key;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Longest error body kept from a response.
const MAX_ERROR_BODY: usize = 1024;

/// Errors returned by [`KeyClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The base URL cannot address the API
    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    /// Transport failure or undecodable body
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request
    #[error(transparent)]
    Service(#[from] KeyError),

    /// The service answered with a status outside the error taxonomy
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or canonical reason
        message: String,
    },
}

impl ClientError {
    /// Service error kind, if the service produced one.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Service(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Client transport settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("key-service-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Use a custom request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Typed client for the key service.
#[derive(Debug, Clone)]
pub struct KeyClient {
    http: Client,
    base_url: Url,
}

impl KeyClient {
    /// Create a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_config(base_url, &ClientConfig::default())
    }

    /// Create a client with custom settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn with_config(base_url: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(format!("{base_url} cannot be a base")));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Generate a new unissued key.
    ///
    /// # Errors
    ///
    /// Returns the service error or a transport failure.
    pub async fn generate(&self) -> Result<Key, ClientError> {
        let response = self.request(Method::POST, &["key"])?.send().await?;
        decode_json(response).await
    }

    /// Allocate one unissued key.
    ///
    /// # Errors
    ///
    /// Returns the service error or a transport failure.
    pub async fn allocate(&self) -> Result<Key, ClientError> {
        let response = self.request(Method::POST, &["key", "issued"])?.send().await?;
        decode_json(response).await
    }

    /// Cancel an issued key.
    ///
    /// # Errors
    ///
    /// Returns the service error or a transport failure.
    pub async fn cancel(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::POST, &["key", id, "canceled"])?
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    /// Current state of a key.
    ///
    /// # Errors
    ///
    /// Returns the service error or a transport failure.
    pub async fn verify(&self, id: &str) -> Result<Key, ClientError> {
        let response = self
            .request(Method::GET, &["key", id, "verification"])?
            .send()
            .await?;
        decode_json(response).await
    }

    /// All keys not yet issued.
    ///
    /// # Errors
    ///
    /// Returns the service error or a transport failure. An empty pool is a
    /// [`ErrorKind::NotFound`] service error.
    pub async fn list_unreleased(&self) -> Result<Vec<Key>, ClientError> {
        let response = self.request(Method::GET, &["key"])?.send().await?;
        decode_json(response).await
    }

    /// Build a request for `/api/v1/{segments...}`, percent-encoding each
    /// segment.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(self.http.request(method, url))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

/// Pass through 2xx responses; decode everything else into an error.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = read_error_body(response).await;
    let message = error_message(&body, status.canonical_reason());

    match kind_for(status) {
        Some(kind) => Err(ClientError::Service(KeyError::new(kind, message))),
        None => Err(ClientError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Read at most [`MAX_ERROR_BODY`] bytes of the body. A failed read keeps
/// what arrived so far.
async fn read_error_body(mut response: Response) -> String {
    let mut body = Vec::with_capacity(MAX_ERROR_BODY);
    while body.len() < MAX_ERROR_BODY {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(MAX_ERROR_BODY - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read error response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Trimmed body capped at [`MAX_ERROR_BODY`] bytes, or the canonical reason
/// when the body is empty.
fn error_message(body: &str, canonical_reason: Option<&str>) -> String {
    let mut end = body.len().min(MAX_ERROR_BODY);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    let message = body[..end].trim();
    if message.is_empty() {
        canonical_reason.unwrap_or("unknown error").to_string()
    } else {
        message.to_string()
    }
}
