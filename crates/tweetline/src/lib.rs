//! Tweetline: capture-and-normalize core for profile timelines.
//!
//! Holds everything that does not need a browser: the capture buffer and
//! request interceptor, the tolerant timeline normalizer, and the output
//! sink. The async session driver and replayer live in `tweetline-runtime`.

pub mod capture;
pub mod interceptor;
pub mod json_path;
pub mod normalize;
pub mod scoring;
pub mod sink;
pub mod types;

pub use capture::{CaptureBuffer, Rejection};
pub use interceptor::{InterceptorConfig, RequestInterceptor};
pub use json_path::{try_get, Seg};
pub use normalize::{normalize, normalize_with_summary, NormalizeSummary};
pub use scoring::{score_tweets, ScoredTweet, SentimentScorer};
pub use sink::{finalize, load_raw_payloads, OutputSink};
pub use types::*;
