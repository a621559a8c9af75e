//! Outbound HTTP capability used to talk to the identity provider.
//!
//! Validators never build their own HTTP client. They receive an
//! `Arc<dyn HttpFetch>` so tests can substitute a scripted fetcher and the
//! binary can share one connection pool between the key cache and the
//! introspection client.
//!
//! # Security
//!
//! - Every call is bounded by a timeout and a caller-supplied cancellation token
//! - Response bodies are returned as opaque bytes and never logged here
//! - Response bodies larger than [`MAX_RESPONSE_BODY_BYTES`] are rejected

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default timeout for identity-provider calls in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Largest identity-provider response body read into memory (1 MiB).
pub const MAX_RESPONSE_BODY_BYTES: usize = 1024 * 1024;

/// A response from the identity provider, reduced to what validators need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,

    /// Raw response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Build a response from a status and body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Why an outbound call did not produce a usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    TimedOut,

    #[error("request cancelled")]
    Cancelled,

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl FetchError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::TimedOut => "timeout",
            FetchError::Cancelled => "cancelled",
            FetchError::UnexpectedStatus(_) => "status",
            FetchError::InvalidBody(_) => "body",
        }
    }
}

/// Trait for outbound HTTP calls (allows mocking in tests).
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Issue a GET request.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;

    /// Issue a POST with an `application/x-www-form-urlencoded` body.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, FetchError>;
}

/// Production fetcher backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.http", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { client }
    }

    async fn read(mut response: reqwest::Response) -> Result<HttpResponse, FetchError> {
        let status = response.status().as_u16();

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BODY_BYTES as u64)
        {
            return Err(body_too_large());
        }

        // Content-Length may be absent or wrong; enforce the cap while reading
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            if body.len().saturating_add(chunk.len()) > MAX_RESPONSE_BODY_BYTES {
                return Err(body_too_large());
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            body: body.freeze(),
        })
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::read(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::read(response).await
    }
}

fn body_too_large() -> FetchError {
    tracing::warn!(
        target: "auth.http",
        limit = MAX_RESPONSE_BODY_BYTES,
        "Identity provider response body exceeds size limit"
    );
    FetchError::InvalidBody(format!("response body exceeds {MAX_RESPONSE_BODY_BYTES} bytes"))
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::TimedOut
    } else {
        // Strip the URL so query strings never reach logs.
        FetchError::Transport(e.without_url().to_string())
    }
}

/// Run an outbound call bounded by `timeout` and `cancel`.
///
/// Cancellation wins over a simultaneously completing call. Dropping the
/// returned future drops the in-flight request with it.
pub async fn guarded<F>(
    call: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<HttpResponse, FetchError>
where
    F: Future<Output = Result<HttpResponse, FetchError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        result = tokio::time::timeout(timeout, call) => {
            result.unwrap_or(Err(FetchError::TimedOut))
        }
    }
}
