//! Timeline normalization: raw paginated JSON into typed tweet records.
//!
//! The walk is best-effort. Payloads without the expected instruction list
//! contribute nothing, and entries missing any nested key are skipped and
//! counted rather than failing the batch.
//!
//! Shape of a user-timeline payload, as far as this module cares:
//!
//! ```text
//! data.user.result.timeline.timeline.instructions[]
//!   { type: "TimelineAddEntries", entries: [
//!       { content: { entryType: "TimelineTimelineItem",
//!                    itemContent: { itemType: "TimelineTweet",
//!                                   tweet_results: { result: {
//!                                       legacy: {...},
//!                                       quoted_status_result: { result: { legacy: {...} } } } } } } } ] }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_path::{count_field, str_field, try_get, Seg};
use crate::types::{CombinedRecord, QuotePair, TimelineViews, TweetRecord};

/// Key path from a payload root to its instruction list.
pub const INSTRUCTIONS_PATH: &[Seg<'static>] = &[
    Seg::Key("data"),
    Seg::Key("user"),
    Seg::Key("result"),
    Seg::Key("timeline"),
    Seg::Key("timeline"),
    Seg::Key("instructions"),
];

const ENTRY_TYPE_PATH: &[Seg<'static>] = &[Seg::Key("content"), Seg::Key("entryType")];
const ITEM_TYPE_PATH: &[Seg<'static>] =
    &[Seg::Key("content"), Seg::Key("itemContent"), Seg::Key("itemType")];
const TWEET_RESULT_PATH: &[Seg<'static>] = &[
    Seg::Key("content"),
    Seg::Key("itemContent"),
    Seg::Key("tweet_results"),
    Seg::Key("result"),
];
const QUOTED_RESULT_PATH: &[Seg<'static>] =
    &[Seg::Key("quoted_status_result"), Seg::Key("result")];

/// `created_at` format used by the platform's legacy fields.
const LEGACY_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Zone-less timestamp forms, read as UTC.
const NAIVE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Classification of a timeline instruction by its `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    AddEntries,
    Other,
}

impl InstructionKind {
    pub fn of(instruction: &Value) -> Self {
        match instruction.get("type").and_then(Value::as_str) {
            Some("TimelineAddEntries") => Self::AddEntries,
            _ => Self::Other,
        }
    }
}

/// Classification of an entry by its `entryType` and `itemType` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A single tweet item.
    Tweet,
    /// Cursors, modules, conversation threads, promoted content.
    Other,
}

impl EntryKind {
    pub fn of(entry: &Value) -> Self {
        let entry_type = try_get(entry, ENTRY_TYPE_PATH).and_then(Value::as_str);
        let item_type = try_get(entry, ITEM_TYPE_PATH).and_then(Value::as_str);
        match (entry_type, item_type) {
            (Some("TimelineTimelineItem"), Some("TimelineTweet")) => Self::Tweet,
            _ => Self::Other,
        }
    }
}

/// Why a tweet entry produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `itemContent.tweet_results.result` is absent.
    MissingResult,
    /// The result (or its visibility wrapper) has no `legacy` object.
    MissingLegacy,
    /// Neither `legacy.id_str` nor `rest_id` is present.
    MissingId,
    /// The same tweet id was already extracted from an earlier entry.
    Duplicate,
}

/// A main tweet and, if present, the tweet it quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTweet {
    pub tweet: TweetRecord,
    pub quoted: Option<TweetRecord>,
}

/// Outcome of extracting a single tweet entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(ExtractedTweet),
    Skipped(SkipReason),
}

/// Counts describing one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeSummary {
    pub total_tweets: usize,
    pub tweets_with_quotes: usize,
    pub combined_tweets: usize,
    pub payloads_without_instructions: usize,
    pub skipped_missing_result: usize,
    pub skipped_missing_legacy: usize,
    pub skipped_missing_id: usize,
    pub duplicates: usize,
}

impl NormalizeSummary {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingResult => self.skipped_missing_result += 1,
            SkipReason::MissingLegacy => self.skipped_missing_legacy += 1,
            SkipReason::MissingId => self.skipped_missing_id += 1,
            SkipReason::Duplicate => self.duplicates += 1,
        }
    }
}

/// Instruction list of one payload, or an empty slice when the path is absent.
pub fn find_instructions(payload: &Value) -> &[Value] {
    try_get(payload, INSTRUCTIONS_PATH)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Normalize payloads into the three views, sorted newest first.
pub fn normalize(payloads: &[Value]) -> TimelineViews {
    normalize_with_summary(payloads).0
}

/// [`normalize`], also returning counts of what was kept and skipped.
pub fn normalize_with_summary(payloads: &[Value]) -> (TimelineViews, NormalizeSummary) {
    let mut views = TimelineViews::default();
    let mut summary = NormalizeSummary::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for payload in payloads {
        let instructions = find_instructions(payload);
        if instructions.is_empty() {
            summary.payloads_without_instructions += 1;
            continue;
        }

        let tweet_entries = instructions
            .iter()
            .filter(|i| InstructionKind::of(i) == InstructionKind::AddEntries)
            .filter_map(|i| i.get("entries").and_then(Value::as_array))
            .flatten()
            .filter(|e| EntryKind::of(e) == EntryKind::Tweet);

        for entry in tweet_entries {
            let extracted = match extract_entry(entry) {
                Extraction::Found(found) if !seen_ids.insert(found.tweet.id.clone()) => {
                    Extraction::Skipped(SkipReason::Duplicate)
                }
                other => other,
            };

            match extracted {
                Extraction::Found(ExtractedTweet { tweet, quoted }) => {
                    if let Some(quoted_tweet) = &quoted {
                        views.quote_pairs.push(QuotePair {
                            main_tweet: tweet.clone(),
                            quoted_tweet: quoted_tweet.clone(),
                        });
                    }
                    views.combined.push(CombinedRecord {
                        tweet: tweet.clone(),
                        quote: quoted,
                    });
                    views.tweets.push(tweet);
                }
                Extraction::Skipped(reason) => {
                    tracing::debug!("skipped timeline entry: {reason:?}");
                    summary.record_skip(reason);
                }
            }
        }
    }

    sort_newest_first(&mut views);

    summary.total_tweets = views.tweets.len();
    summary.tweets_with_quotes = views.quote_pairs.len();
    summary.combined_tweets = views.combined.len();

    tracing::info!(
        "normalized {} payload(s): {} tweets, {} with quotes, {} entries skipped",
        payloads.len(),
        summary.total_tweets,
        summary.tweets_with_quotes,
        summary.skipped_missing_result
            + summary.skipped_missing_legacy
            + summary.skipped_missing_id
            + summary.duplicates,
    );

    (views, summary)
}

/// Stable sort of every view by descending `created_at_epoch`.
pub fn sort_newest_first(views: &mut TimelineViews) {
    views
        .tweets
        .sort_by(|a, b| b.created_at_epoch.cmp(&a.created_at_epoch));
    views
        .quote_pairs
        .sort_by(|a, b| b.main_tweet.created_at_epoch.cmp(&a.main_tweet.created_at_epoch));
    views.combined.sort_by_key(|c| std::cmp::Reverse(c.epoch()));
}

/// Extract the main tweet (and any quoted tweet) from a tweet entry.
pub fn extract_entry(entry: &Value) -> Extraction {
    let Some(result) = try_get(entry, TWEET_RESULT_PATH)
    else {
        return Extraction::Skipped(SkipReason::MissingResult);
    };

    let tweet = match extract_result(result) {
        Ok(tweet) => tweet,
        Err(reason) => return Extraction::Skipped(reason),
    };

    // A quoted tweet that cannot be extracted leaves the main tweet standing alone.
    let quoted = try_get(result, QUOTED_RESULT_PATH)
        .and_then(|q| extract_result(q).ok());

    Extraction::Found(ExtractedTweet { tweet, quoted })
}

/// Build a record from a tweet result, unwrapping visibility wrappers.
fn extract_result(result: &Value) -> Result<TweetRecord, SkipReason> {
    let result = unwrap_visibility(result);
    let legacy = result
        .get("legacy")
        .filter(|l| l.is_object())
        .ok_or(SkipReason::MissingLegacy)?;
    extract_record(legacy, result.get("rest_id").and_then(Value::as_str))
        .ok_or(SkipReason::MissingId)
}

fn unwrap_visibility(result: &Value) -> &Value {
    match result.get("__typename").and_then(Value::as_str) {
        Some("TweetWithVisibilityResults") => result.get("tweet").unwrap_or(result),
        _ => result,
    }
}

/// Map a legacy field bag onto a [`TweetRecord`].
///
/// Returns `None` only when no id can be found. Every other field falls
/// back to its empty value.
pub fn extract_record(legacy: &Value, rest_id: Option<&str>) -> Option<TweetRecord> {
    let id = str_field(legacy, "id_str")
        .filter(|id| !id.is_empty())
        .or_else(|| rest_id.filter(|id| !id.is_empty()).map(str::to_string))?;

    let raw_time = str_field(legacy, "created_at").unwrap_or_default();
    let (created_at_iso, created_at_epoch) = parse_created_at(&raw_time);

    Some(TweetRecord {
        id,
        text: str_field(legacy, "full_text").unwrap_or_default(),
        created_at_iso,
        created_at_epoch,
        retweet_count: count_field(legacy, "retweet_count"),
        favorite_count: count_field(legacy, "favorite_count"),
        reply_count: count_field(legacy, "reply_count"),
        quote_count: count_field(legacy, "quote_count"),
        lang: str_field(legacy, "lang").unwrap_or_default(),
        in_reply_to_status_id: str_field(legacy, "in_reply_to_status_id_str").unwrap_or_default(),
        in_reply_to_user_id: str_field(legacy, "in_reply_to_user_id_str").unwrap_or_default(),
        in_reply_to_screen_name: str_field(legacy, "in_reply_to_screen_name").unwrap_or_default(),
    })
}

/// Parse a source timestamp into `(iso, epoch_seconds)`.
///
/// Empty input gives `(None, 0)`. Unparsable input keeps the raw string
/// with epoch `0`.
pub fn parse_created_at(raw: &str) -> (Option<String>, i64) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, 0);
    }

    let parsed = DateTime::parse_from_str(raw, LEGACY_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| (dt.to_rfc3339(), dt.timestamp()))
        .ok()
        .or_else(|| parse_naive_utc(raw).map(|dt| (dt.to_rfc3339(), dt.timestamp())));

    match parsed {
        Some((iso, epoch)) => (Some(iso), epoch),
        None => (Some(raw.to_string()), 0),
    }
}

fn parse_naive_utc(raw: &str) -> Option<DateTime<chrono::Utc>> {
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
        .map(|naive| naive.and_utc())
}
