//! Boundary to a downstream sentiment scorer.
//!
//! No model lives here. A scorer takes a batch of texts and returns one
//! score per text; scores are clamped to `[-1, 1]` before being paired
//! back with their records.

use serde::{Deserialize, Serialize};

use crate::types::TweetRecord;

/// Batch sentiment scoring over tweet texts.
pub trait SentimentScorer {
    /// One score per input, in input order.
    fn score_batch(&self, texts: &[String]) -> Vec<f32>;
}

/// A record id with its bounded score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTweet {
    pub id: String,
    pub score: f32,
}

/// Score `tweets` in one batch.
///
/// A scorer that returns fewer scores than inputs leaves the tail unscored;
/// non-finite scores are dropped.
pub fn score_tweets(scorer: &dyn SentimentScorer, tweets: &[TweetRecord]) -> Vec<ScoredTweet> {
    let texts: Vec<String> = tweets.iter().map(|t| t.text.clone()).collect();
    let scores = scorer.score_batch(&texts);
    if scores.len() != tweets.len() {
        tracing::warn!(
            "scorer returned {} scores for {} tweets",
            scores.len(),
            tweets.len()
        );
    }

    tweets
        .iter()
        .zip(scores)
        .filter(|(_, score)| score.is_finite())
        .map(|(tweet, score)| ScoredTweet {
            id: tweet.id.clone(),
            score: score.clamp(-1.0, 1.0),
        })
        .collect()
}
