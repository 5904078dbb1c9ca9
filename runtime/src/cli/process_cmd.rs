//! CLI handler for `tweetline process <raw.json>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tweetline::load_raw_payloads;

use crate::cli::{output, OutputArgs};
use crate::config::{normalize_handle, HarvestConfig, DEFAULT_MAX_TWEETS};
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Args)]
pub struct ProcessArgs {
    /// Raw payload file, e.g. one written by `scrape --save-raw`
    pub input: PathBuf,

    /// Prefix for the output files (usually the profile handle)
    #[arg(long)]
    pub user: String,

    /// Maximum tweets to keep
    #[arg(long, default_value_t = DEFAULT_MAX_TWEETS)]
    pub max_tweets: usize,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Run the process command.
pub async fn run(args: ProcessArgs) -> Result<()> {
    let payloads = load_raw_payloads(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    tracing::info!(
        "loaded {} payload(s) from {}",
        payloads.len(),
        args.input.display()
    );

    let mut config = HarvestConfig::new(normalize_handle(&args.user));
    config.max_tweets = args.max_tweets;

    let mut pipeline = Pipeline::new(config);
    if let Some(sink) = args.output.sink(&pipeline.config().user) {
        pipeline = pipeline.with_sink(sink, false);
    }

    let outcome = pipeline.process_offline(&payloads)?;
    output::print_outcome(&outcome);
    Ok(())
}
