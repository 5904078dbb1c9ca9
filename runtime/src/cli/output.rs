//! Terminal output honoring the global `--json` and `--quiet` flags.
//!
//! `main` exports the flags as `TWEETLINE_JSON` / `TWEETLINE_QUIET` so every
//! command can check them without threading them through.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

use crate::pipeline::HarvestOutcome;
use crate::session::StopReason;

pub fn is_json() -> bool {
    std::env::var_os("TWEETLINE_JSON").is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os("TWEETLINE_QUIET").is_some()
}

pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::warn!("failed to render JSON output: {e}"),
    }
}

/// Spinner on stderr, hidden under `--quiet` or `--json`.
pub fn spinner(message: &str) -> ProgressBar {
    if is_quiet() || is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Print the result of a scrape or process run.
pub fn print_outcome(outcome: &HarvestOutcome) {
    if is_json() {
        print_json(&outcome_json(outcome));
        return;
    }
    if is_quiet() {
        return;
    }

    let report = outcome.report();
    match outcome {
        HarvestOutcome::NoData { reason, .. } => {
            println!("  No data available: {reason}");
        }
        HarvestOutcome::Harvested(harvest) => {
            println!(
                "  @{}: {} tweets, {} with quotes",
                report.user,
                harvest.views.tweets.len(),
                harvest.views.quote_pairs.len()
            );
        }
    }

    if let Some(stop) = &report.stop {
        println!(
            "  Session: {} after {} scrolls, {} requests captured",
            describe_stop(stop),
            report.scrolls,
            report.captured
        );
        println!(
            "  Replay:  {}/{} succeeded, {} rate limited",
            report.replay.succeeded, report.replay.attempted, report.replay.rate_limited
        );
    }
    for path in &report.files {
        println!("  Wrote {}", path.display());
    }
}

fn outcome_json(outcome: &HarvestOutcome) -> serde_json::Value {
    match outcome {
        HarvestOutcome::Harvested(harvest) => json!({
            "status": "harvested",
            "report": harvest.report,
            "tweets": harvest.views.tweets.len(),
            "quote_pairs": harvest.views.quote_pairs.len(),
        }),
        HarvestOutcome::NoData { reason, report } => json!({
            "status": "no_data",
            "reason": reason,
            "message": reason.to_string(),
            "report": report,
        }),
    }
}

fn describe_stop(stop: &StopReason) -> String {
    match stop {
        StopReason::Stagnant { iterations } => {
            format!("stopped, no new requests for {iterations} scrolls")
        }
        StopReason::TargetReached => "target reached".to_string(),
        StopReason::MaxScrolls => "scroll limit reached".to_string(),
        StopReason::Aborted { error } => format!("aborted ({error})"),
    }
}
