//! CLI handler for `tweetline scrape <user>`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::{output, OutputArgs};
use crate::config::{secs_to_duration, DelayRange, HarvestConfig};
use crate::pipeline::Pipeline;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::Renderer;

/// Flags of the `scrape` command. Unset flags fall back to `TWEETLINE_*`
/// variables, then to built-in defaults.
#[derive(Debug, Clone, Args)]
pub struct ScrapeArgs {
    /// Profile handle, with or without the leading @
    pub user: String,

    /// Maximum tweets to keep (also caps captured requests)
    #[arg(long)]
    pub max_tweets: Option<usize>,

    /// Maximum scroll iterations
    #[arg(long)]
    pub max_scrolls: Option<u32>,

    /// Minimum pause after each scroll, in seconds
    #[arg(long)]
    pub scroll_pause_min: Option<f64>,

    /// Maximum pause after each scroll, in seconds
    #[arg(long)]
    pub scroll_pause_max: Option<f64>,

    /// Minimum delay between replayed requests, in seconds
    #[arg(long)]
    pub request_delay_min: Option<f64>,

    /// Maximum delay between replayed requests, in seconds
    #[arg(long)]
    pub request_delay_max: Option<f64>,

    /// Maximum pixels per scroll step
    #[arg(long)]
    pub scroll_distance: Option<u32>,

    /// Non-growing scrolls tolerated before stopping
    #[arg(long)]
    pub stagnation_limit: Option<u32>,

    /// Probability of a short backward scroll after each step
    #[arg(long)]
    pub jiggle_probability: Option<f64>,

    /// Cooldown after an HTTP 429, in seconds
    #[arg(long)]
    pub rate_limit_cooldown: Option<f64>,

    /// Site root the profile URL is built from
    #[arg(long)]
    pub base_url: Option<String>,

    /// Chromium binary to launch instead of auto-discovery
    #[arg(long)]
    pub chromium_path: Option<PathBuf>,

    /// Browser profile directory holding an authenticated session
    #[arg(long)]
    pub user_data_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Also write the raw replayed payloads to <user>_tweets_raw.json
    #[arg(long)]
    pub save_raw: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ScrapeArgs {
    /// Resolve the run configuration: flags over environment over defaults.
    pub fn config(&self) -> Result<HarvestConfig> {
        let mut cfg = HarvestConfig::from_env(self.user.clone());

        if let Some(v) = self.max_tweets {
            cfg.max_tweets = v;
        }
        if let Some(v) = self.max_scrolls {
            cfg.max_scrolls = v;
        }
        if let Some(v) = self.scroll_distance {
            cfg.scroll_distance = v;
        }
        if let Some(v) = self.stagnation_limit {
            cfg.stagnation_limit = v;
        }
        if let Some(v) = self.jiggle_probability {
            cfg.jiggle_probability = v;
        }
        if let Some(v) = self.rate_limit_cooldown {
            cfg.rate_limit_cooldown = secs_to_duration(v);
        }
        if let Some(v) = &self.base_url {
            cfg.base_url = v.clone();
        }
        if let Some(p) = &self.chromium_path {
            cfg.chromium_path = Some(p.clone());
        }
        if let Some(p) = &self.user_data_dir {
            cfg.user_data_dir = Some(p.clone());
        }
        if self.headful {
            cfg.headless = false;
        }
        cfg.scroll_pause =
            override_range(cfg.scroll_pause, self.scroll_pause_min, self.scroll_pause_max);
        cfg.request_delay = override_range(
            cfg.request_delay,
            self.request_delay_min,
            self.request_delay_max,
        );

        cfg.validate()?;
        Ok(cfg)
    }
}

fn override_range(range: DelayRange, min: Option<f64>, max: Option<f64>) -> DelayRange {
    if min.is_none() && max.is_none() {
        return range;
    }
    DelayRange::secs(
        min.unwrap_or(range.min.as_secs_f64()),
        max.unwrap_or(range.max.as_secs_f64()),
    )
}

/// Run the scrape command.
pub async fn run(args: ScrapeArgs) -> Result<()> {
    let config = args.config()?;

    let renderer = ChromiumRenderer::launch(
        config.chromium_path.as_deref(),
        config.user_data_dir.as_deref(),
        config.headless,
    )
    .await?;

    let mut pipeline = Pipeline::new(config.clone());
    if let Some(sink) = args.output.sink(&config.user) {
        pipeline = pipeline.with_sink(sink, args.save_raw);
    }

    let spinner = output::spinner(&format!("Harvesting @{}", config.user));
    let result = pipeline.run(&renderer).await;
    spinner.finish_and_clear();

    if let Err(e) = renderer.shutdown().await {
        tracing::warn!("browser shutdown failed: {e:#}");
    }

    output::print_outcome(&result?);
    Ok(())
}
