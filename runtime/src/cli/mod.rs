//! CLI subcommand implementations for the `tweetline` binary.

pub mod doctor;
pub mod output;
pub mod process_cmd;
pub mod scrape_cmd;

use std::path::PathBuf;

use clap::Args;
use tweetline::{OutputSink, ViewKind};

/// Where and what to persist, shared by `scrape` and `process`.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Directory for the JSON output files
    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,

    /// Views to write, comma separated (all, with_quotes, combined). Default: all three
    #[arg(long, value_delimiter = ',')]
    pub views: Vec<ViewKind>,

    /// Keep results in memory only; write no files
    #[arg(long)]
    pub no_save: bool,
}

impl OutputArgs {
    /// Sink for `prefix`, or `None` under `--no-save`.
    pub fn sink(&self, prefix: &str) -> Option<OutputSink> {
        if self.no_save {
            return None;
        }
        let sink = OutputSink::new(&self.output_dir, prefix);
        Some(if self.views.is_empty() {
            sink
        } else {
            sink.with_views(&self.views)
        })
    }
}
