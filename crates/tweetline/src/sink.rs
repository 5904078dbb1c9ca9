//! Output sink: final bounds on the views and JSON persistence.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::types::{TimelineViews, TweetlineResult, ViewKind};

/// Truncate `tweets` and `combined` to `limit` entries.
///
/// Quote pairs are a derived subset and are not cut independently; pairs
/// whose main tweet fell outside the limit are dropped with it.
pub fn finalize(mut views: TimelineViews, limit: usize) -> TimelineViews {
    views.tweets.truncate(limit);
    views.combined.truncate(limit);

    let kept: HashSet<&str> = views.tweets.iter().map(|t| t.id.as_str()).collect();
    views
        .quote_pairs
        .retain(|pair| kept.contains(pair.main_tweet.id.as_str()));

    views
}

/// Writes views as pretty-printed JSON arrays under `<dir>/<prefix>_*.json`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    dir: PathBuf,
    prefix: String,
    views: Vec<ViewKind>,
}

impl OutputSink {
    /// A sink that persists every view.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            views: ViewKind::EVERY.to_vec(),
        }
    }

    /// Restrict persistence to the given views.
    pub fn with_views(mut self, views: &[ViewKind]) -> Self {
        self.views = ViewKind::EVERY
            .into_iter()
            .filter(|v| views.contains(v))
            .collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ViewKind) -> PathBuf {
        self.dir.join(kind.file_name(&self.prefix))
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(format!("{}_tweets_raw.json", self.prefix))
    }

    /// Write each selected view and return the files written.
    ///
    /// The quotes file is only written when there is at least one pair.
    pub fn persist(&self, views: &TimelineViews) -> TweetlineResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for &kind in &self.views {
            let path = self.path_for(kind);
            match kind {
                ViewKind::All => write_json(&path, &views.tweets)?,
                ViewKind::WithQuotes if views.quote_pairs.is_empty() => continue,
                ViewKind::WithQuotes => write_json(&path, &views.quote_pairs)?,
                ViewKind::Combined => write_json(&path, &views.combined)?,
            }
            tracing::info!("wrote {} view to {}", kind, path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Write the raw replayed payloads as one JSON array.
    pub fn persist_raw(&self, payloads: &[Value]) -> TweetlineResult<PathBuf> {
        let path = self.raw_path();
        write_json(&path, payloads)?;
        tracing::info!("wrote {} raw payload(s) to {}", payloads.len(), path.display());
        Ok(path)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> TweetlineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Load raw payloads saved by a previous run.
///
/// Accepts either a JSON array of payloads or a single payload object.
pub fn load_raw_payloads(path: &Path) -> TweetlineResult<Vec<Value>> {
    let reader = BufReader::new(File::open(path)?);
    let value: Value = serde_json::from_reader(reader)?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}
