//! Core data types for captured requests and normalized timeline records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An intercepted network call, as seen leaving the browser page.
///
/// Immutable once captured. Two requests are the same capture when their
/// [`dedup_key`](Self::dedup_key) matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl CapturedRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Attach a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `METHOD:url`, the identity used for deduplication.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.method, self.url)
    }
}

/// One flattened tweet, built from a result's legacy field bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub id: String,
    pub text: String,
    /// ISO-8601 timestamp, or the raw source string when it could not be parsed.
    #[serde(rename = "created_at")]
    pub created_at_iso: Option<String>,
    /// Seconds since the Unix epoch; `0` when the timestamp is absent or unparsable.
    #[serde(rename = "created_at_timestamp")]
    pub created_at_epoch: i64,
    pub retweet_count: u64,
    pub favorite_count: u64,
    pub reply_count: u64,
    pub quote_count: u64,
    pub lang: String,
    /// Reply linkage; empty when the tweet is not a reply.
    pub in_reply_to_status_id: String,
    pub in_reply_to_user_id: String,
    pub in_reply_to_screen_name: String,
}

/// A main tweet together with the tweet it quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePair {
    pub main_tweet: TweetRecord,
    pub quoted_tweet: TweetRecord,
}

/// A tweet record with its quoted tweet (if any) attached inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedRecord {
    #[serde(flatten)]
    pub tweet: TweetRecord,
    pub quote: Option<TweetRecord>,
}

impl CombinedRecord {
    pub fn epoch(&self) -> i64 {
        self.tweet.created_at_epoch
    }
}

/// Which output view a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    All,
    WithQuotes,
    Combined,
}

impl ViewKind {
    pub const EVERY: [ViewKind; 3] = [ViewKind::All, ViewKind::WithQuotes, ViewKind::Combined];

    /// File name for this view under the given prefix (usually the user handle).
    pub fn file_name(self, prefix: &str) -> String {
        match self {
            Self::All => format!("{prefix}_all_tweets.json"),
            Self::WithQuotes => format!("{prefix}_tweets_with_quotes.json"),
            Self::Combined => format!("{prefix}_combined_tweets.json"),
        }
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::WithQuotes => write!(f, "with_quotes"),
            Self::Combined => write!(f, "combined"),
        }
    }
}

impl std::str::FromStr for ViewKind {
    type Err = TweetlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_tweets" => Ok(Self::All),
            "with_quotes" | "quotes" => Ok(Self::WithQuotes),
            "combined" => Ok(Self::Combined),
            other => Err(TweetlineError::InvalidConfig(format!(
                "unknown view '{other}' (expected all, with_quotes, combined)"
            ))),
        }
    }
}

/// The three aligned output views of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineViews {
    pub tweets: Vec<TweetRecord>,
    pub quote_pairs: Vec<QuotePair>,
    pub combined: Vec<CombinedRecord>,
}

impl TimelineViews {
    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty()
    }

    /// Serialize one view as a JSON array.
    pub fn select(&self, kind: ViewKind) -> TweetlineResult<serde_json::Value> {
        let value = match kind {
            ViewKind::All => serde_json::to_value(&self.tweets)?,
            ViewKind::WithQuotes => serde_json::to_value(&self.quote_pairs)?,
            ViewKind::Combined => serde_json::to_value(&self.combined)?,
        };
        Ok(value)
    }
}

/// Errors that can occur in the core library.
#[derive(thiserror::Error, Debug)]
pub enum TweetlineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result type.
pub type TweetlineResult<T> = Result<T, TweetlineError>;
