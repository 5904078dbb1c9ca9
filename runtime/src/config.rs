//! Harvest configuration.
//!
//! Defaults, then `TWEETLINE_*` environment overrides, then CLI flags on
//! top. [`HarvestConfig::validate`] runs before any browser is launched.

use std::path::PathBuf;
use std::time::Duration;

use tweetline::InterceptorConfig;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://x.com";
pub const DEFAULT_MAX_TWEETS: usize = 100;
pub const DEFAULT_MAX_SCROLLS: u32 = 50;
pub const DEFAULT_SCROLL_DISTANCE: u32 = 2500;
pub const DEFAULT_JIGGLE_PROBABILITY: f64 = 0.2;
pub const DEFAULT_JIGGLE_DISTANCE: u32 = 300;
pub const DEFAULT_STAGNATION_LIMIT: u32 = 10;
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Longest single wait any delay or cooldown may be configured to.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Inclusive `[min, max]` range a randomized wait is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange::new(Duration::ZERO, Duration::ZERO);

    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    /// Build from fractional seconds; negative or non-finite input becomes zero.
    pub fn secs(min: f64, max: f64) -> Self {
        Self::new(secs_to_duration(min), secs_to_duration(max))
    }

    fn check(&self, name: &'static str) -> Result<(), ConfigError> {
        check_wait(name, self.max)?;
        if self.min > self.max {
            return Err(ConfigError::InvertedRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Seconds to a duration; negative or non-finite input becomes zero.
pub fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn check_wait(name: &'static str, wait: Duration) -> Result<(), ConfigError> {
    if wait > MAX_WAIT {
        return Err(ConfigError::TooLong {
            name,
            value: wait,
            limit: MAX_WAIT,
        });
    }
    Ok(())
}

/// Invalid harvest configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("user handle is empty")]
    EmptyUser,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name}: min {min:?} is greater than max {max:?}")]
    InvertedRange {
        name: &'static str,
        min: Duration,
        max: Duration,
    },

    #[error("{name}: {value:?} exceeds the {limit:?} limit")]
    TooLong {
        name: &'static str,
        value: Duration,
        limit: Duration,
    },

    #[error("jiggle probability {0} is outside [0, 1]")]
    Probability(f64),

    #[error("invalid base URL '{0}'")]
    BaseUrl(String),
}

/// Everything one capture run needs to know.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Profile handle, without the leading `@`.
    pub user: String,
    pub base_url: String,
    /// Caps the capture buffer, the replay count, and the final views.
    pub max_tweets: usize,
    pub max_scrolls: u32,
    pub scroll_pause: DelayRange,
    pub request_delay: DelayRange,
    /// Upper bound of one scroll step in pixels; each step is drawn from `[d/2, d]`.
    pub scroll_distance: u32,
    /// Wait after the profile page loads, before the first scroll.
    pub settle: DelayRange,
    pub jiggle_probability: f64,
    pub jiggle_distance: u32,
    pub jiggle_pause: DelayRange,
    /// Non-growing iterations tolerated in a row; the next one ends the scroll loop.
    pub stagnation_limit: u32,
    pub rate_limit_cooldown: Duration,
    pub failure_penalty: DelayRange,
    pub navigation_timeout: Duration,
    pub request_timeout: Duration,
    pub interceptor: InterceptorConfig,
    pub chromium_path: Option<PathBuf>,
    /// Existing browser profile whose session cookies are reused.
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
}

impl HarvestConfig {
    /// Built-in defaults for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: normalize_handle(&user.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tweets: DEFAULT_MAX_TWEETS,
            max_scrolls: DEFAULT_MAX_SCROLLS,
            scroll_pause: DelayRange::millis(2_000, 4_000),
            request_delay: DelayRange::millis(1_000, 3_000),
            scroll_distance: DEFAULT_SCROLL_DISTANCE,
            settle: DelayRange::millis(6_000, 9_000),
            jiggle_probability: DEFAULT_JIGGLE_PROBABILITY,
            jiggle_distance: DEFAULT_JIGGLE_DISTANCE,
            jiggle_pause: DelayRange::millis(300, 800),
            stagnation_limit: DEFAULT_STAGNATION_LIMIT,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            failure_penalty: DelayRange::millis(2_000, 5_000),
            navigation_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(20),
            interceptor: InterceptorConfig::default(),
            chromium_path: None,
            user_data_dir: None,
            headless: true,
        }
    }

    /// Defaults overridden by `TWEETLINE_*` environment variables.
    pub fn from_env(user: impl Into<String>) -> Self {
        Self::from_lookup(user, |name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_lookup<F>(user: impl Into<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut cfg = Self::new(user);

        if let Some(v) = env.string("TWEETLINE_BASE_URL") {
            cfg.base_url = v;
        }
        cfg.max_tweets = env.parsed("TWEETLINE_MAX_TWEETS", cfg.max_tweets);
        cfg.max_scrolls = env.parsed("TWEETLINE_MAX_SCROLLS", cfg.max_scrolls);
        cfg.scroll_pause = env.range(
            "TWEETLINE_SCROLL_PAUSE_MIN",
            "TWEETLINE_SCROLL_PAUSE_MAX",
            cfg.scroll_pause,
        );
        cfg.request_delay = env.range(
            "TWEETLINE_REQUEST_DELAY_MIN",
            "TWEETLINE_REQUEST_DELAY_MAX",
            cfg.request_delay,
        );
        cfg.settle = env.range("TWEETLINE_SETTLE_MIN", "TWEETLINE_SETTLE_MAX", cfg.settle);
        cfg.scroll_distance = env.parsed("TWEETLINE_SCROLL_DISTANCE", cfg.scroll_distance);
        cfg.jiggle_probability =
            env.parsed("TWEETLINE_JIGGLE_PROBABILITY", cfg.jiggle_probability);
        cfg.stagnation_limit = env.parsed("TWEETLINE_STAGNATION_LIMIT", cfg.stagnation_limit);
        cfg.rate_limit_cooldown = secs_to_duration(env.parsed(
            "TWEETLINE_RATE_LIMIT_COOLDOWN",
            cfg.rate_limit_cooldown.as_secs_f64(),
        ));
        if let Some(v) = env.string("TWEETLINE_CHROMIUM_PATH") {
            cfg.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env.string("TWEETLINE_USER_DATA_DIR") {
            cfg.user_data_dir = Some(PathBuf::from(v));
        }
        cfg
    }

    /// Full URL of the profile timeline.
    pub fn profile_url(&self) -> Result<String, ConfigError> {
        let base = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::BaseUrl(self.base_url.clone()))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::BaseUrl(self.base_url.clone()));
        }
        let url = base
            .join(&self.user)
            .map_err(|_| ConfigError::BaseUrl(self.base_url.clone()))?;
        Ok(url.to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }
        if self.max_tweets == 0 {
            return Err(ConfigError::Zero("max_tweets"));
        }
        if self.max_scrolls == 0 {
            return Err(ConfigError::Zero("max_scrolls"));
        }
        if self.scroll_distance == 0 {
            return Err(ConfigError::Zero("scroll_distance"));
        }
        if self.stagnation_limit == 0 {
            return Err(ConfigError::Zero("stagnation_limit"));
        }
        if !(0.0..=1.0).contains(&self.jiggle_probability) {
            return Err(ConfigError::Probability(self.jiggle_probability));
        }
        self.scroll_pause.check("scroll_pause")?;
        self.request_delay.check("request_delay")?;
        self.settle.check("settle")?;
        self.jiggle_pause.check("jiggle_pause")?;
        self.failure_penalty.check("failure_penalty")?;
        check_wait("rate_limit_cooldown", self.rate_limit_cooldown)?;
        check_wait("navigation_timeout", self.navigation_timeout)?;
        check_wait("request_timeout", self.request_timeout)?;
        self.profile_url()?;
        Ok(())
    }
}

/// Strip a leading `@` and surrounding whitespace from a handle.
pub fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        match self.string(name) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("ignoring {name}={raw}: not a valid value");
                default
            }),
            None => default,
        }
    }

    fn range(&self, min_name: &str, max_name: &str, default: DelayRange) -> DelayRange {
        let min = self.parsed(min_name, default.min.as_secs_f64());
        let max = self.parsed(max_name, default.max.as_secs_f64());
        DelayRange::secs(min, max)
    }
}
