//! Session driver: one browser page, a settle wait, then a bounded and
//! randomized scroll loop while the interceptor fills the capture buffer.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tweetline::{CaptureBuffer, RequestInterceptor};

use crate::config::{HarvestConfig, MAX_WAIT};
use crate::pacing::Pacer;
use crate::renderer::{RenderContext, RequestStream};

/// Where a capture session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Navigating,
    Scrolling,
    Stagnant,
    LimitReached,
    Done,
}

/// Why a session stopped scrolling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// No new requests for more than `stagnation_limit` iterations.
    Stagnant { iterations: u32 },
    /// The buffer holds `target_count` requests.
    TargetReached,
    /// `max_scrolls` iterations ran.
    MaxScrolls,
    /// Navigation or scrolling failed; whatever was captured is kept.
    Aborted { error: String },
}

impl StopReason {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StopReason::Aborted { .. })
    }
}

/// Mutable state of one session, owned by the driver.
#[derive(Debug)]
pub struct CaptureSession {
    pub buffer: CaptureBuffer,
    pub scroll_count: u32,
    pub stagnation_count: u32,
    pub target_count: usize,
    pub max_scrolls: u32,
    pub stagnation_limit: u32,
    pub phase: SessionPhase,
    last_len: usize,
}

impl CaptureSession {
    pub fn new(target_count: usize, max_scrolls: u32, stagnation_limit: u32) -> Self {
        Self {
            buffer: CaptureBuffer::new(target_count),
            scroll_count: 0,
            stagnation_count: 0,
            target_count,
            max_scrolls,
            stagnation_limit,
            phase: SessionPhase::Navigating,
            last_len: 0,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.max_tweets,
            config.max_scrolls,
            config.stagnation_limit,
        )
    }

    /// Enter the scroll loop, taking the current buffer size as baseline.
    pub fn mark_scroll_start(&mut self) {
        self.last_len = self.buffer.len();
        self.phase = SessionPhase::Scrolling;
    }

    /// Close one scroll iteration and decide whether to stop.
    ///
    /// Checked in order: target reached, stagnation, scroll ceiling.
    pub fn end_iteration(&mut self) -> Option<StopReason> {
        self.scroll_count += 1;
        let len = self.buffer.len();

        if len >= self.target_count {
            self.phase = SessionPhase::LimitReached;
            return Some(StopReason::TargetReached);
        }

        if len > self.last_len {
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }
        self.last_len = len;

        if self.stagnation_count > self.stagnation_limit {
            self.phase = SessionPhase::Stagnant;
            return Some(StopReason::Stagnant {
                iterations: self.stagnation_count,
            });
        }

        if self.scroll_count >= self.max_scrolls {
            self.phase = SessionPhase::LimitReached;
            return Some(StopReason::MaxScrolls);
        }

        None
    }
}

/// What a finished session hands to the replayer.
#[derive(Debug)]
pub struct SessionOutcome {
    pub buffer: CaptureBuffer,
    pub stop: StopReason,
    pub scrolls: u32,
    /// Cookies of the page at the end of the session, for replay.
    pub cookie_header: Option<String>,
}

/// Drives one render context through a capture session.
pub struct SessionDriver {
    config: HarvestConfig,
    interceptor: RequestInterceptor,
    pacer: Pacer,
}

impl SessionDriver {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            config: config.clone(),
            interceptor: RequestInterceptor::new(config.interceptor.clone()),
            pacer: Pacer::new(),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Run the session to completion.
    ///
    /// Never fails: errors while navigating or scrolling end the session
    /// early with [`StopReason::Aborted`]. The context is closed on every
    /// path.
    pub async fn run(mut self, mut ctx: Box<dyn RenderContext>, url: &str) -> SessionOutcome {
        let mut session = CaptureSession::from_config(&self.config);

        let stop = match self.drive(ctx.as_mut(), &mut session, url).await {
            Ok(reason) => reason,
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    captured = session.buffer.len(),
                    "session aborted, keeping captured requests"
                );
                StopReason::Aborted {
                    error: format!("{e:#}"),
                }
            }
        };
        session.phase = SessionPhase::Done;

        let cookie_header = match ctx.cookie_header().await {
            Ok(header) => header,
            Err(e) => {
                debug!("no cookies exported: {e:#}");
                None
            }
        };
        if let Err(e) = ctx.close().await {
            warn!("page did not close cleanly: {e:#}");
        }

        info!(
            stop = ?stop,
            scrolls = session.scroll_count,
            captured = session.buffer.len(),
            "capture session finished"
        );

        SessionOutcome {
            buffer: session.buffer,
            stop,
            scrolls: session.scroll_count,
            cookie_header,
        }
    }

    async fn drive(
        &mut self,
        ctx: &mut dyn RenderContext,
        session: &mut CaptureSession,
        url: &str,
    ) -> Result<StopReason> {
        let mut requests = ctx.watch_requests().await?;

        session.phase = SessionPhase::Navigating;
        info!(url, "navigating to profile");
        let timeout_ms = self.config.navigation_timeout.as_millis() as u64;
        let nav = ctx
            .navigate(url, timeout_ms)
            .await
            .context("failed to load profile page")?;
        debug!(
            final_url = %nav.final_url,
            load_time_ms = nav.load_time_ms,
            "profile page loaded"
        );

        let settle = self.pacer.delay(self.config.settle);
        self.wait_capturing(&mut requests, session, settle).await;
        if session.buffer.is_full() {
            session.phase = SessionPhase::LimitReached;
            return Ok(StopReason::TargetReached);
        }

        session.mark_scroll_start();
        loop {
            let dy = self.pacer.scroll_distance(self.config.scroll_distance);
            ctx.scroll_by(i64::from(dy)).await.context("scroll failed")?;
            let pause = self.pacer.delay(self.config.scroll_pause);
            self.wait_capturing(&mut requests, session, pause).await;

            if self.pacer.chance(self.config.jiggle_probability) {
                let back = self.pacer.jiggle_distance(self.config.jiggle_distance);
                ctx.scroll_by(-i64::from(back))
                    .await
                    .context("scroll failed")?;
                let pause = self.pacer.delay(self.config.jiggle_pause);
                self.wait_capturing(&mut requests, session, pause).await;
            }

            if let Some(reason) = session.end_iteration() {
                return Ok(reason);
            }
            debug!(
                scroll = session.scroll_count,
                captured = session.buffer.len(),
                stagnant = session.stagnation_count,
                "scroll iteration done"
            );
        }
    }

    /// Wait out `wait` while feeding observed requests to the interceptor.
    async fn wait_capturing(
        &self,
        requests: &mut RequestStream,
        session: &mut CaptureSession,
        wait: Duration,
    ) {
        let now = Instant::now();
        let deadline = now.checked_add(wait).unwrap_or(now + MAX_WAIT);
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                next = requests.recv() => match next {
                    Some(request) => {
                        self.interceptor.observe(request, &mut session.buffer);
                    }
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        break;
                    }
                },
            }
        }
        while let Ok(request) = requests.try_recv() {
            self.interceptor.observe(request, &mut session.buffer);
        }
    }
}
