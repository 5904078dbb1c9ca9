//! Async HTTP client wrapping reqwest.
//!
//! Not a browser: replays a captured request with its original method and
//! headers, plus the cookies exported from the page that issued it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use std::time::Duration;
use tweetline::CapturedRequest;

use super::{ReplayResponse, ReplayTransport};

/// Headers that belong to the original connection rather than the request.
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    // reqwest is built without decompression, so ask for a plain body.
    "accept-encoding",
];

/// HTTP client for the replayer.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    cookie_header: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client with standard Chrome user-agent.
    pub fn new(timeout: Duration) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        Self {
            client,
            cookie_header: None,
        }
    }

    /// Send `cookie_header` with every request that did not capture its own.
    pub fn with_cookies(mut self, cookie_header: Option<String>) -> Self {
        self.cookie_header = cookie_header;
        self
    }

    fn header_map(&self, request: &CapturedRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            if name.starts_with(':') || SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str())
            {
                continue;
            }
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::debug!("dropping unrepresentable header {name}"),
            }
        }

        if !headers.contains_key(COOKIE) {
            if let Some(value) = self
                .cookie_header
                .as_deref()
                .and_then(|c| HeaderValue::from_str(c).ok())
            {
                headers.insert(COOKIE, value);
            }
        }
        headers
    }
}

#[async_trait]
impl ReplayTransport for HttpClient {
    async fn send(&self, request: &CapturedRequest) -> Result<ReplayResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("invalid method {}", request.method))?;

        let resp = self
            .client
            .request(method, &request.url)
            .headers(self.header_map(request))
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.context("failed to read response body")?;
        Ok(ReplayResponse { status, body })
    }
}
