//! Full harvest runs against a scripted browser page and transport.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use tweetline::{load_raw_payloads, CapturedRequest, OutputSink, ViewKind};
use tweetline_runtime::renderer::{NavigationResult, RenderContext, Renderer, RequestStream};
use tweetline_runtime::replay::{ReplayResponse, ReplayTransport};
use tweetline_runtime::{HarvestConfig, HarvestOutcome, NoDataReason, Pipeline, StopReason};

// ── helpers ──

fn call(cursor: usize) -> CapturedRequest {
    CapturedRequest::new(
        "GET",
        format!("https://x.com/i/api/graphql/Q7/UserTweets?cursor={cursor}"),
    )
    .with_header("x-csrf-token", "abc")
}

fn noise() -> CapturedRequest {
    CapturedRequest::new("POST", "https://x.com/i/api/1.1/jot/client_event.json")
}

#[derive(Clone, Default)]
struct PageScript {
    on_navigate: Vec<CapturedRequest>,
    /// Requests emitted by the n-th forward scroll (1-based).
    on_scroll: HashMap<usize, Vec<CapturedRequest>>,
    fail_on_scroll: Option<usize>,
}

struct ScriptedRenderer {
    script: PageScript,
    active: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    fn new(script: PageScript) -> Self {
        Self {
            script,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            script: self.script.clone(),
            forward: Mutex::new(0),
            tx: None,
            active: Arc::clone(&self.active),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct ScriptedPage {
    script: PageScript,
    forward: Mutex<usize>,
    tx: Option<mpsc::UnboundedSender<CapturedRequest>>,
    active: Arc<AtomicUsize>,
}

impl ScriptedPage {
    fn emit(&self, requests: &[CapturedRequest]) {
        if let Some(tx) = &self.tx {
            for r in requests {
                let _ = tx.send(r.clone());
            }
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.emit(&self.script.on_navigate);
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 40,
        })
    }

    async fn execute_js(&self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        if dy < 0 {
            return Ok(());
        }
        let n = {
            let mut forward = self.forward.lock().unwrap();
            *forward += 1;
            *forward
        };
        if self.script.fail_on_scroll == Some(n) {
            anyhow::bail!("Target closed");
        }
        if let Some(requests) = self.script.on_scroll.get(&n) {
            self.emit(requests);
        }
        Ok(())
    }

    async fn watch_requests(&mut self) -> Result<RequestStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn cookie_header(&self) -> Result<Option<String>> {
        Ok(Some("auth_token=secret; ct0=abc".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves canned responses by URL.
struct CannedTransport {
    responses: HashMap<String, (u16, Value)>,
}

#[async_trait]
impl ReplayTransport for CannedTransport {
    async fn send(&self, request: &CapturedRequest) -> Result<ReplayResponse> {
        match self.responses.get(&request.url) {
            Some((status, body)) => Ok(ReplayResponse {
                status: *status,
                body: body.to_string(),
            }),
            None => anyhow::bail!("unexpected request {}", request.url),
        }
    }
}

fn tweet(id: &str, created_at: &str) -> Value {
    json!({
        "__typename": "Tweet",
        "rest_id": id,
        "legacy": {
            "id_str": id,
            "full_text": format!("text of {id}"),
            "created_at": created_at,
            "favorite_count": 3,
            "lang": "en"
        }
    })
}

fn entry(result: Value) -> Value {
    json!({
        "entryId": "tweet",
        "content": {
            "entryType": "TimelineTimelineItem",
            "itemContent": { "itemType": "TimelineTweet", "tweet_results": { "result": result } }
        }
    })
}

fn page(entries: Vec<Value>) -> Value {
    json!({ "data": { "user": { "result": { "timeline": { "timeline": {
        "instructions": [
            { "type": "TimelineClearCache" },
            { "type": "TimelineAddEntries", "entries": entries }
        ]
    }}}}}})
}

fn canned() -> CannedTransport {
    let mut quoting = tweet("300", "Fri Nov 17 09:00:00 +0000 2023");
    quoting["quoted_status_result"] = json!({ "result": tweet("50", "Mon Nov 13 09:00:00 +0000 2023") });

    let mut responses = HashMap::new();
    responses.insert(
        call(0).url,
        (
            200,
            page(vec![entry(quoting), entry(tweet("200", "Thu Nov 16 09:00:00 +0000 2023"))]),
        ),
    );
    responses.insert(call(1).url, (429, json!({ "errors": [{ "code": 88 }] })));
    responses.insert(
        call(2).url,
        (
            200,
            page(vec![
                entry(tweet("200", "Thu Nov 16 09:00:00 +0000 2023")),
                entry(tweet("100", "Wed Nov 15 09:00:00 +0000 2023")),
            ]),
        ),
    );
    responses.insert(call(3).url, (200, json!({ "errors": [{ "message": "Over capacity" }] })));
    CannedTransport { responses }
}

fn config() -> HarvestConfig {
    let mut cfg = HarvestConfig::new("@someone");
    cfg.max_tweets = 10;
    cfg.max_scrolls = 20;
    cfg.stagnation_limit = 2;
    cfg.jiggle_probability = 0.0;
    cfg
}

fn scrolling_page() -> PageScript {
    PageScript {
        on_navigate: vec![call(0), noise()],
        on_scroll: HashMap::from([
            (1, vec![call(1), call(0)]),
            (2, vec![call(2)]),
            (3, vec![call(3), noise()]),
        ]),
        fail_on_scroll: None,
    }
}

// ── tests ──

#[tokio::test(start_paused = true)]
async fn harvest_runs_session_replay_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = ScriptedRenderer::new(scrolling_page());
    let pipeline =
        Pipeline::new(config()).with_sink(OutputSink::new(dir.path(), "someone"), true);

    let mut cookies = None;
    let start = Instant::now();
    let outcome = pipeline
        .run_with_transport(&renderer, |c| {
            cookies = c;
            canned()
        })
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(cookies.as_deref(), Some("auth_token=secret; ct0=abc"));
    assert_eq!(renderer.active_contexts(), 0);

    let HarvestOutcome::Harvested(harvest) = outcome else {
        panic!("expected a harvest");
    };
    let report = &harvest.report;
    assert_eq!(report.user, "someone");
    assert_eq!(report.stop, Some(StopReason::Stagnant { iterations: 3 }));
    assert_eq!(report.scrolls, 6);
    assert_eq!(report.captured, 4);
    assert_eq!(report.replay.attempted, 4);
    assert_eq!(report.replay.succeeded, 3);
    assert_eq!(report.replay.rate_limited, 1);
    assert_eq!(report.summary.duplicates, 1);
    assert_eq!(report.summary.payloads_without_instructions, 1);

    let ids: Vec<&str> = harvest.views.tweets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["300", "200", "100"]);
    assert_eq!(harvest.views.quote_pairs.len(), 1);
    assert_eq!(harvest.views.quote_pairs[0].quoted_tweet.id, "50");
    assert_eq!(
        harvest.views.combined[0].quote.as_ref().map(|q| q.id.as_str()),
        Some("50")
    );

    let raw = load_raw_payloads(&dir.path().join("someone_tweets_raw.json")).unwrap();
    assert_eq!(raw.len(), 3);
    for kind in ViewKind::EVERY {
        assert!(dir.path().join(kind.file_name("someone")).exists(), "{kind}");
    }
    assert_eq!(report.files.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn broken_page_still_replays_what_was_captured() {
    let mut script = scrolling_page();
    script.fail_on_scroll = Some(2);
    let renderer = ScriptedRenderer::new(script);

    let outcome = Pipeline::new(config())
        .run_with_transport(&renderer, |_| canned())
        .await
        .unwrap();

    let report = outcome.report();
    assert!(matches!(report.stop, Some(StopReason::Aborted { .. })));
    assert_eq!(report.captured, 2);
    assert_eq!(renderer.active_contexts(), 0);

    let views = outcome.views().expect("tweets from the first payload");
    let ids: Vec<&str> = views.tweets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["300", "200"]);
}

#[tokio::test(start_paused = true)]
async fn silent_page_reports_no_data() {
    let renderer = ScriptedRenderer::new(PageScript {
        on_navigate: vec![noise()],
        ..Default::default()
    });

    let outcome = Pipeline::new(config())
        .run_with_transport(&renderer, |_| canned())
        .await
        .unwrap();

    match outcome {
        HarvestOutcome::NoData { reason, report } => {
            assert_eq!(reason, NoDataReason::NothingCaptured);
            assert_eq!(report.replay.attempted, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn offline_processing_matches_saved_payloads() {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../crates/tweetline/tests/fixtures/user_tweets_raw.json");
    let payloads = load_raw_payloads(&fixture).unwrap();

    let mut cfg = HarvestConfig::new("someone");
    cfg.max_tweets = 2;
    let outcome = Pipeline::new(cfg).process_offline(&payloads).unwrap();

    let views = outcome.views().unwrap();
    assert_eq!(views.tweets.len(), 2);
    assert_eq!(views.combined.len(), 2);
    assert!(views
        .quote_pairs
        .iter()
        .all(|p| views.tweets.iter().any(|t| t.id == p.main_tweet.id)));
}
