//! End-to-end harvest: session, replay, normalization and output.
//!
//! Only environment failures (bad configuration, no browser page) are
//! errors. Everything downstream degrades: an aborted session still
//! replays what it captured, and an empty result is reported as
//! [`HarvestOutcome::NoData`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};
use tweetline::{finalize, normalize_with_summary, NormalizeSummary, OutputSink, TimelineViews};
use uuid::Uuid;

use crate::config::HarvestConfig;
use crate::renderer::Renderer;
use crate::replay::{HttpClient, ReplayReport, ReplayTransport, Replayer};
use crate::session::{SessionDriver, SessionOutcome, StopReason};

/// Why a run produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    /// The session saw no admissible request.
    NothingCaptured,
    /// Every replayed request failed.
    NothingReplayed,
    /// Payloads came back but held no tweet entries.
    NoTweets,
}

impl std::fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NoDataReason::NothingCaptured => "no timeline requests were captured",
            NoDataReason::NothingReplayed => "no captured request could be replayed",
            NoDataReason::NoTweets => "no tweets found in the replayed payloads",
        };
        f.write_str(text)
    }
}

/// What happened during one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestReport {
    pub user: String,
    pub run_id: String,
    /// `None` for offline runs.
    pub stop: Option<StopReason>,
    pub scrolls: u32,
    pub captured: usize,
    pub replay: ReplayReport,
    pub summary: NormalizeSummary,
    /// Files written by the output sink.
    pub files: Vec<PathBuf>,
}

/// Final views of a successful run.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub views: TimelineViews,
    pub report: HarvestReport,
}

#[derive(Debug, Clone)]
pub enum HarvestOutcome {
    Harvested(Harvest),
    NoData {
        reason: NoDataReason,
        report: HarvestReport,
    },
}

impl HarvestOutcome {
    pub fn report(&self) -> &HarvestReport {
        match self {
            HarvestOutcome::Harvested(h) => &h.report,
            HarvestOutcome::NoData { report, .. } => report,
        }
    }

    pub fn views(&self) -> Option<&TimelineViews> {
        match self {
            HarvestOutcome::Harvested(h) => Some(&h.views),
            HarvestOutcome::NoData { .. } => None,
        }
    }
}

/// Runs harvests for one configuration.
pub struct Pipeline {
    config: HarvestConfig,
    sink: Option<OutputSink>,
    save_raw: bool,
}

impl Pipeline {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config,
            sink: None,
            save_raw: false,
        }
    }

    /// Persist views through `sink`; with `save_raw`, also the raw payloads.
    pub fn with_sink(mut self, sink: OutputSink, save_raw: bool) -> Self {
        self.sink = Some(sink);
        self.save_raw = save_raw;
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest the configured profile, replaying over HTTP.
    pub async fn run(&self, renderer: &dyn Renderer) -> Result<HarvestOutcome> {
        let timeout = self.config.request_timeout;
        self.run_with_transport(renderer, move |cookies| {
            HttpClient::new(timeout).with_cookies(cookies)
        })
        .await
    }

    /// Harvest with a caller-built transport.
    ///
    /// `make_transport` receives the cookie header exported from the page
    /// once the session has finished.
    pub async fn run_with_transport<T, F>(
        &self,
        renderer: &dyn Renderer,
        make_transport: F,
    ) -> Result<HarvestOutcome>
    where
        T: ReplayTransport,
        F: FnOnce(Option<String>) -> T,
    {
        self.config.validate()?;
        let url = self.config.profile_url()?;
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("harvest", %run_id, user = %self.config.user);

        async move {
            let ctx = renderer
                .new_context()
                .await
                .context("failed to open a browser page")?;
            let session = SessionDriver::new(&self.config).run(ctx, &url).await;
            let transport = make_transport(session.cookie_header.clone());
            Ok::<_, anyhow::Error>(self.complete(run_id, session, transport).await)
        }
        .instrument(span)
        .await
    }

    /// Replay and normalize the result of a finished session.
    pub async fn complete<T: ReplayTransport>(
        &self,
        run_id: String,
        session: SessionOutcome,
        transport: T,
    ) -> HarvestOutcome {
        let mut report = HarvestReport {
            user: self.config.user.clone(),
            run_id,
            stop: Some(session.stop.clone()),
            scrolls: session.scrolls,
            captured: session.buffer.len(),
            ..Default::default()
        };

        if session.buffer.is_empty() {
            return no_data(NoDataReason::NothingCaptured, report);
        }

        let (payloads, replay) = Replayer::new(transport, &self.config)
            .replay(&session.buffer)
            .await;
        report.replay = replay;

        if self.save_raw {
            if let Some(sink) = &self.sink {
                match sink.persist_raw(&payloads) {
                    Ok(path) => report.files.push(path),
                    Err(e) => warn!("failed to write raw payloads: {e}"),
                }
            }
        }

        if payloads.is_empty() {
            return no_data(NoDataReason::NothingReplayed, report);
        }
        self.finish(&payloads, report)
    }

    /// Normalize payloads loaded from disk, without a browser.
    pub fn process_offline(&self, payloads: &[Value]) -> Result<HarvestOutcome> {
        if self.config.max_tweets == 0 {
            anyhow::bail!("max_tweets must be greater than zero");
        }
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("process", %run_id, user = %self.config.user);
        let _guard = span.enter();

        let report = HarvestReport {
            user: self.config.user.clone(),
            run_id,
            ..Default::default()
        };
        Ok(self.finish(payloads, report))
    }

    fn finish(&self, payloads: &[Value], mut report: HarvestReport) -> HarvestOutcome {
        let (views, summary) = normalize_with_summary(payloads);
        report.summary = summary;
        if views.tweets.is_empty() {
            return no_data(NoDataReason::NoTweets, report);
        }

        let views = finalize(views, self.config.max_tweets);
        if let Some(sink) = &self.sink {
            match sink.persist(&views) {
                Ok(files) => report.files.extend(files),
                Err(e) => warn!("failed to persist views: {e}"),
            }
        }

        HarvestOutcome::Harvested(Harvest { views, report })
    }
}

fn no_data(reason: NoDataReason, report: HarvestReport) -> HarvestOutcome {
    info!(%reason, "no data available");
    HarvestOutcome::NoData { reason, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NoopRenderer;
    use crate::replay::ReplayResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tweetline::{CaptureBuffer, CapturedRequest, ViewKind};

    // ── helpers ──

    /// Returns the same response for every request and counts calls.
    struct FixedTransport {
        status: u16,
        body: String,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(status: u16, body: Value) -> Self {
            Self {
                status,
                body: body.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReplayTransport for &FixedTransport {
        async fn send(&self, _request: &CapturedRequest) -> Result<ReplayResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(ReplayResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn payload(ids: &[(&str, &str)]) -> Value {
        let entries: Vec<Value> = ids
            .iter()
            .map(|(id, created_at)| {
                json!({
                    "entryId": format!("tweet-{id}"),
                    "content": {
                        "entryType": "TimelineTimelineItem",
                        "itemContent": {
                            "itemType": "TimelineTweet",
                            "tweet_results": { "result": {
                                "rest_id": id,
                                "legacy": { "full_text": "hi", "created_at": created_at }
                            }}
                        }
                    }
                })
            })
            .collect();
        json!({ "data": { "user": { "result": { "timeline": { "timeline": {
            "instructions": [{ "type": "TimelineAddEntries", "entries": entries }]
        }}}}}})
    }

    fn session(count: usize) -> SessionOutcome {
        let mut buffer = CaptureBuffer::new(100);
        for n in 0..count {
            buffer.admit(CapturedRequest::new(
                "GET",
                format!("https://x.com/i/api/graphql/q/UserTweets?n={n}"),
            ));
        }
        SessionOutcome {
            buffer,
            stop: StopReason::Stagnant { iterations: 11 },
            scrolls: 12,
            cookie_header: None,
        }
    }

    fn config() -> HarvestConfig {
        let mut cfg = HarvestConfig::new("someone");
        cfg.max_tweets = 2;
        cfg
    }

    // ── tests ──

    #[tokio::test]
    async fn test_missing_browser_is_hard_error() {
        let err = Pipeline::new(config()).run(&NoopRenderer).await.unwrap_err();
        assert!(format!("{err:#}").contains("browser"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_first() {
        let mut cfg = config();
        cfg.max_scrolls = 0;
        assert!(Pipeline::new(cfg).run(&NoopRenderer).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_capture_skips_replay() {
        let transport = FixedTransport::new(200, json!({}));
        let outcome = Pipeline::new(config())
            .complete("r".into(), session(0), &transport)
            .await;

        assert!(matches!(
            outcome,
            HarvestOutcome::NoData { reason: NoDataReason::NothingCaptured, .. }
        ));
        assert_eq!(transport.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_replays_is_no_data() {
        let transport = FixedTransport::new(503, json!({}));
        let outcome = Pipeline::new(config())
            .complete("r".into(), session(2), &transport)
            .await;

        match outcome {
            HarvestOutcome::NoData { reason, report } => {
                assert_eq!(reason, NoDataReason::NothingReplayed);
                assert_eq!(report.replay.failed, 2);
                assert_eq!(report.captured, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_payloads_without_tweets_is_no_data() {
        let transport = FixedTransport::new(200, json!({ "errors": [] }));
        let outcome = Pipeline::new(config())
            .complete("r".into(), session(1), &transport)
            .await;

        match outcome {
            HarvestOutcome::NoData { reason, report } => {
                assert_eq!(reason, NoDataReason::NoTweets);
                assert_eq!(report.summary.payloads_without_instructions, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_truncates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let body = payload(&[
            ("10", "Wed Nov 15 18:45:10 +0000 2023"),
            ("11", "Thu Nov 16 18:45:10 +0000 2023"),
            ("12", "Fri Nov 17 18:45:10 +0000 2023"),
        ]);
        let transport = FixedTransport::new(200, body);
        let pipeline = Pipeline::new(config()).with_sink(OutputSink::new(dir.path(), "someone"), true);

        let outcome = pipeline.complete("r".into(), session(1), &transport).await;
        let HarvestOutcome::Harvested(harvest) = outcome else {
            panic!("expected a harvest");
        };

        let ids: Vec<&str> = harvest.views.tweets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["12", "11"]);
        assert_eq!(harvest.views.combined.len(), 2);
        assert_eq!(harvest.report.summary.total_tweets, 3);

        // raw dump, all tweets, combined; no quote pairs so no quotes file
        assert_eq!(harvest.report.files.len(), 3);
        assert!(dir.path().join("someone_tweets_raw.json").exists());
        assert!(dir.path().join("someone_all_tweets.json").exists());
        assert!(!dir.path().join(ViewKind::WithQuotes.file_name("someone")).exists());
    }

    #[test]
    fn test_process_offline_without_sink() {
        let payloads = vec![payload(&[("1", "2023-11-15 10:00:00")]), json!({})];
        let outcome = Pipeline::new(config()).process_offline(&payloads).unwrap();

        let views = outcome.views().unwrap();
        assert_eq!(views.tweets[0].created_at_epoch, 1700042400);
        assert!(outcome.report().files.is_empty());
        assert_eq!(outcome.report().stop, None);
    }

    #[test]
    fn test_report_serializes_stop_reason() {
        let report = HarvestReport {
            stop: Some(StopReason::Stagnant { iterations: 11 }),
            ..Default::default()
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stop"], json!({ "kind": "stagnant", "iterations": 11 }));
    }
}
