//! Out-of-band replay of captured requests.
//!
//! Requests go out one at a time in capture order with a jittered delay
//! between them. Failures are counted and paced, never raised: a 429 costs
//! the rate-limit cooldown, anything else a short random penalty. The same
//! request is never retried.

pub mod http_client;

pub use http_client::HttpClient;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use tweetline::{CaptureBuffer, CapturedRequest};

use crate::config::{DelayRange, HarvestConfig};
use crate::pacing::Pacer;

/// Status line and body of one replayed request.
#[derive(Debug, Clone)]
pub struct ReplayResponse {
    pub status: u16,
    pub body: String,
}

/// Sends a captured request again.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    async fn send(&self, request: &CapturedRequest) -> Result<ReplayResponse>;
}

/// Counters for one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Includes rate-limited requests.
    pub failed: usize,
    pub rate_limited: usize,
    /// Total time spent in rate-limit cooldowns.
    pub cooldown_ms: u64,
}

/// Replays a capture buffer over a [`ReplayTransport`].
pub struct Replayer<T> {
    transport: T,
    max_requests: usize,
    request_delay: DelayRange,
    rate_limit_cooldown: Duration,
    failure_penalty: DelayRange,
    pacer: Pacer,
}

impl<T: ReplayTransport> Replayer<T> {
    pub fn new(transport: T, config: &HarvestConfig) -> Self {
        Self {
            transport,
            max_requests: config.max_tweets,
            request_delay: config.request_delay,
            rate_limit_cooldown: config.rate_limit_cooldown,
            failure_penalty: config.failure_penalty,
            pacer: Pacer::new(),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Replay at most `max_tweets` buffered requests in capture order.
    ///
    /// Returns the parsed bodies of the successful ones, possibly none.
    pub async fn replay(&mut self, buffer: &CaptureBuffer) -> (Vec<Value>, ReplayReport) {
        let mut payloads = Vec::new();
        let mut report = ReplayReport::default();

        for (i, request) in buffer.iter().take(self.max_requests).enumerate() {
            if i > 0 {
                let delay = self.pacer.delay(self.request_delay);
                tokio::time::sleep(delay).await;
            }
            report.attempted += 1;

            match self.transport.send(request).await {
                Ok(resp) if resp.status == 200 => match serde_json::from_str::<Value>(&resp.body) {
                    Ok(payload) => {
                        payloads.push(payload);
                        report.succeeded += 1;
                    }
                    Err(e) => {
                        warn!(url = %request.url, "unparsable response body: {e}");
                        self.penalize(&mut report).await;
                    }
                },
                Ok(resp) if resp.status == 429 => {
                    warn!(
                        url = %request.url,
                        cooldown_secs = self.rate_limit_cooldown.as_secs_f64(),
                        "rate limited, cooling down"
                    );
                    report.failed += 1;
                    report.rate_limited += 1;
                    report.cooldown_ms = report.cooldown_ms.saturating_add(
                        u64::try_from(self.rate_limit_cooldown.as_millis()).unwrap_or(u64::MAX),
                    );
                    tokio::time::sleep(self.rate_limit_cooldown).await;
                }
                Ok(resp) => {
                    warn!(url = %request.url, status = resp.status, "replay failed");
                    self.penalize(&mut report).await;
                }
                Err(e) => {
                    warn!(url = %request.url, "replay failed: {e:#}");
                    self.penalize(&mut report).await;
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            rate_limited = report.rate_limited,
            "replay finished"
        );
        (payloads, report)
    }

    async fn penalize(&mut self, report: &mut ReplayReport) {
        report.failed += 1;
        let penalty = self.pacer.delay(self.failure_penalty);
        tokio::time::sleep(penalty).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    // ── helpers ──

    /// Answers by URL; unknown URLs are transport errors.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: HashMap<String, (u16, String)>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn respond(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
            self.responses.insert(url.to_string(), (status, body.into()));
            self
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplayTransport for ScriptedTransport {
        async fn send(&self, request: &CapturedRequest) -> Result<ReplayResponse> {
            self.sent.lock().unwrap().push(request.url.clone());
            match self.responses.get(&request.url) {
                Some((status, body)) => Ok(ReplayResponse {
                    status: *status,
                    body: body.clone(),
                }),
                None => anyhow::bail!("connection refused"),
            }
        }
    }

    fn url(n: usize) -> String {
        format!("https://x.com/i/api/graphql/q1/UserTweets?cursor={n}")
    }

    fn buffer(count: usize) -> CaptureBuffer {
        let mut buffer = CaptureBuffer::new(100);
        for n in 1..=count {
            buffer.admit(CapturedRequest::new("GET", url(n)));
        }
        buffer
    }

    fn timeline_payload(id: &str) -> String {
        json!({
            "data": { "user": { "result": { "timeline": { "timeline": { "instructions": [{
                "type": "TimelineAddEntries",
                "entries": [{
                    "entryId": format!("tweet-{id}"),
                    "content": {
                        "entryType": "TimelineTimelineItem",
                        "itemContent": {
                            "itemType": "TimelineTweet",
                            "tweet_results": { "result": {
                                "rest_id": id,
                                "legacy": {
                                    "id_str": id,
                                    "full_text": format!("tweet {id}"),
                                    "created_at": "Wed Nov 15 18:45:10 +0000 2023"
                                }
                            }}
                        }
                    }
                }]
            }]}}}}}
        })
        .to_string()
    }

    fn replayer(transport: ScriptedTransport) -> Replayer<ScriptedTransport> {
        Replayer::new(transport, &HarvestConfig::new("someone")).with_pacer(Pacer::seeded(5))
    }

    // ── tests ──

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cools_down_and_continues() {
        let transport = ScriptedTransport::default()
            .respond(&url(1), 200, timeline_payload("1"))
            .respond(&url(2), 429, "")
            .respond(&url(3), 200, timeline_payload("3"));
        let mut replayer = replayer(transport);

        let start = Instant::now();
        let (payloads, report) = replayer.replay(&buffer(3)).await;

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(
            report,
            ReplayReport {
                attempted: 3,
                succeeded: 2,
                failed: 1,
                rate_limited: 1,
                cooldown_ms: 60_000,
            }
        );
        assert_eq!(replayer.transport.sent(), [url(1), url(2), url(3)]);

        let ids: Vec<String> = tweetline::normalize(&payloads)
            .tweets
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"1".to_string()) && ids.contains(&"3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_not_raised() {
        let transport = ScriptedTransport::default()
            .respond(&url(1), 500, "oops")
            .respond(&url(2), 200, "<html>not json</html>");
        let mut replayer = replayer(transport);

        let (payloads, report) = replayer.replay(&buffer(3)).await;

        assert!(payloads.is_empty());
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 3);
        assert_eq!(report.rate_limited, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_by_max_tweets() {
        let mut cfg = HarvestConfig::new("someone");
        cfg.max_tweets = 2;
        let transport = ScriptedTransport::default()
            .respond(&url(1), 200, "{}")
            .respond(&url(2), 200, "{}")
            .respond(&url(3), 200, "{}");
        let mut replayer = Replayer::new(transport, &cfg);

        let (payloads, report) = replayer.replay(&buffer(3)).await;

        assert_eq!(payloads.len(), 2);
        assert_eq!(report.attempted, 2);
        assert_eq!(replayer.transport.sent(), [url(1), url(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_requests() {
        let transport = ScriptedTransport::default()
            .respond(&url(1), 200, "{}")
            .respond(&url(2), 200, "{}");
        let mut replayer = replayer(transport);

        let start = Instant::now();
        replayer.replay(&buffer(1)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        replayer.replay(&buffer(2)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed <= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_empty_buffer_yields_nothing() {
        let mut replayer = replayer(ScriptedTransport::default());
        let (payloads, report) = replayer.replay(&CaptureBuffer::new(5)).await;
        assert!(payloads.is_empty());
        assert_eq!(report, ReplayReport::default());
    }
}
