//! Renderer abstraction for the browser that loads the profile page.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The session
//! driver only talks to these traits, which keeps it testable without a
//! real browser.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tweetline::CapturedRequest;

/// Outgoing requests observed in a context, in issue order.
pub type RequestStream = mpsc::UnboundedReceiver<CapturedRequest>;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;

    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;

    /// Scroll the viewport vertically by `dy` pixels (negative scrolls up).
    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.execute_js(&format!("window.scrollBy(0, {dy}); window.scrollY"))
            .await?;
        Ok(())
    }

    /// Start forwarding every outgoing request of this context.
    ///
    /// Must be called before `navigate` so the initial page load is seen.
    async fn watch_requests(&mut self) -> Result<RequestStream>;

    /// `Cookie` header value for the current page, if it holds any cookies.
    async fn cookie_header(&self) -> Result<Option<String>>;

    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A renderer that never produces a context.
///
/// Stands in when Chromium is missing so that callers get an explicit
/// launch failure instead of an empty harvest.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

/// Join cookie pairs into a single `Cookie` header value.
pub(crate) fn join_cookies<'a, I>(pairs: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let joined = pairs
        .into_iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_renderer_refuses_contexts() {
        let renderer = NoopRenderer;
        assert!(renderer.new_context().await.is_err());
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.unwrap();
    }

    #[test]
    fn test_join_cookies() {
        assert_eq!(
            join_cookies([("ct0", "abc"), ("", "ignored"), ("lang", "en")]),
            Some("ct0=abc; lang=en".to_string())
        );
        assert_eq!(join_cookies(Vec::<(&str, &str)>::new()), None);
    }
}
