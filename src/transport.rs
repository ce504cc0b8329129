//! Authenticated transport boundary
//!
//! The pipeline never constructs or validates credentials; it only
//! consumes a [`Transport`] capable of issuing authorized GET requests
//! against attachment URLs. Two implementations are provided, covering
//! the two authentication mechanisms Slack exports are fetched with: an
//! API token (`Authorization: Bearer`) and a browser session cookie.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Capability to issue authorized GET requests against attachment URLs
///
/// Implementations return the response body on success, or
/// [`Error::Retrieval`] carrying the status code for non-success
/// responses. The retrieval engine treats either as an opaque outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the payload behind `url`
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Validate that a download URL is well-formed http(s)
fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Issue the request and map the response to bytes-or-error
async fn execute(request: reqwest::RequestBuilder, url: &str) -> Result<Vec<u8>> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Retrieval {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await?;
    debug!(url, bytes = body.len(), "attachment fetched");
    Ok(body.to_vec())
}

/// Transport authenticating with a Slack API token
///
/// Sends `Authorization: Bearer <token>` on every request.
pub struct TokenTransport {
    client: reqwest::Client,
    token: String,
}

impl TokenTransport {
    /// Create a token transport with the given per-request timeout
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for TokenTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        validate_url(url)?;
        let request = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", self.token));
        execute(request, url).await
    }
}

/// Transport authenticating with a browser session cookie
///
/// Sends the raw cookie string as the `Cookie` header on every request,
/// exactly as captured from an authenticated browser session.
pub struct CookieTransport {
    client: reqwest::Client,
    cookie: String,
}

impl CookieTransport {
    /// Create a cookie transport with the given per-request timeout
    ///
    /// Trailing newlines are stripped so a cookie read straight from a
    /// file works unmodified.
    pub fn new(cookie: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            cookie: cookie.into().trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}

#[async_trait]
impl Transport for CookieTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        validate_url(url)?;
        let request = self
            .client
            .get(url)
            .header(reqwest::header::COOKIE, self.cookie.clone());
        execute(request, url).await
    }
}
