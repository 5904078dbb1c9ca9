//! Passive filter over a page's outgoing requests.
//!
//! Only timeline-shaped data-API calls are admitted into the capture
//! buffer. The interceptor never alters a request and never fetches.

use url::Url;

use crate::capture::CaptureBuffer;
use crate::types::CapturedRequest;

/// Path segment marking the platform's data API.
pub const DEFAULT_API_MARKER: &str = "graphql";

/// Operations fetched while a profile timeline scrolls.
pub const DEFAULT_OPERATIONS: &[&str] = &["UserTweets", "TweetResultByRestId", "UserMedia"];

/// Which requests count as timeline data fetches.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Path segment that must appear in the URL (matched as `/<marker>/`).
    pub api_marker: String,
    /// Operation names admitted by exact match.
    pub operations: Vec<String>,
    /// Substring admitted in the operation name, case-insensitive.
    pub timeline_marker: String,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            api_marker: DEFAULT_API_MARKER.to_string(),
            operations: DEFAULT_OPERATIONS.iter().map(|s| s.to_string()).collect(),
            timeline_marker: "timeline".to_string(),
        }
    }
}

/// Classifies outgoing requests and feeds admissible ones to a buffer.
#[derive(Debug, Clone, Default)]
pub struct RequestInterceptor {
    config: InterceptorConfig,
}

impl RequestInterceptor {
    pub fn new(config: InterceptorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// True when `request` is a timeline or tweet data fetch.
    pub fn classify(&self, request: &CapturedRequest) -> bool {
        let Ok(url) = Url::parse(&request.url) else {
            return false;
        };
        let Some(operation) = operation_after_marker(&url, &self.config.api_marker) else {
            return false;
        };

        if self.config.operations.iter().any(|op| op == operation) {
            return true;
        }

        // The query string carries feature flags that mention timelines on
        // almost every call, so only the operation name is searched.
        let marker = self.config.timeline_marker.to_ascii_lowercase();
        !marker.is_empty() && operation.to_ascii_lowercase().contains(&marker)
    }

    /// Classify `request` and admit it into `buffer` if it qualifies.
    ///
    /// Returns true only when the request was newly added.
    pub fn observe(&self, request: CapturedRequest, buffer: &mut CaptureBuffer) -> bool {
        if !self.classify(&request) {
            return false;
        }
        let key = request.dedup_key();
        let admitted = buffer.admit(request);
        if admitted {
            tracing::debug!("captured {key} ({} buffered)", buffer.len());
        }
        admitted
    }
}

/// Operation name of a data-API URL: `/<marker>/<query id>/<Operation>`.
///
/// `None` when the marker segment is absent. A URL without an operation
/// segment yields an empty name, which nothing admits.
fn operation_after_marker<'u>(url: &'u Url, marker: &str) -> Option<&'u str> {
    let mut segments = url.path_segments()?;
    segments.by_ref().find(|s| *s == marker)?;
    let _query_id = segments.next();
    Some(segments.next().unwrap_or(""))
}
