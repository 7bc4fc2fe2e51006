//! Discovery feed and ripple suggestion log: append-only JSONL side channels.
//!
//! The feed is observational. Entries go through a channel to one writer
//! task; a write that fails is logged and dropped, never surfaced to the
//! caller. The suggestion log is written directly and reports failures.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tigerclaw_common::{Action, TigerclawError};
use tigerclaw_graph::{RippleReport, RippleTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Evaluating,
    Watching,
    Found,
    Disqualified,
    Summary,
    Compound,
    Progress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub status: FeedStatus,
    pub name: String,
    pub detail: String,
    /// Local wall-clock `HH:MM`.
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
}

impl FeedEntry {
    pub fn new(status: FeedStatus, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            name: name.into(),
            detail: detail.into(),
            time: Local::now().format("%H:%M").to_string(),
            strength: None,
            reason: None,
            results: None,
        }
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strength = Some(strength.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_results(mut self, results: serde_json::Value) -> Self {
        self.results = Some(results);
        self
    }
}

/// Sender half of the discovery feed. Cheap to clone; a disabled feed
/// swallows everything.
#[derive(Clone, Default)]
pub struct DiscoveryFeed {
    tx: Option<mpsc::UnboundedSender<FeedEntry>>,
}

/// The single writer task behind a [`DiscoveryFeed`].
pub struct FeedWriter {
    handle: JoinHandle<usize>,
}

impl FeedWriter {
    /// Wait for the writer to drain. Completes once every feed clone has been
    /// dropped; returns how many lines were written.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "Feed writer task failed");
                0
            }
        }
    }
}

impl DiscoveryFeed {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Start the writer task appending to `path`.
    pub fn open(path: PathBuf) -> (Self, FeedWriter) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(path, rx));
        (Self { tx: Some(tx) }, FeedWriter { handle })
    }

    pub fn emit(&self, entry: FeedEntry) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(entry).is_err() {
            debug!("Feed writer gone, dropping entry");
        }
    }
}

async fn write_loop(path: PathBuf, mut rx: mpsc::UnboundedReceiver<FeedEntry>) -> usize {
    let mut file = match open_append(&path).await {
        Ok(f) => Some(f),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Cannot open discovery feed, entries will be dropped");
            None
        }
    };

    let mut written = 0;
    while let Some(entry) = rx.recv().await {
        let Some(f) = file.as_mut() else {
            continue;
        };
        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize feed entry");
                continue;
            }
        };
        line.push(b'\n');
        match f.write_all(&line).await {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, name = %entry.name, "Failed to write feed entry"),
        }
    }
    if let Some(mut f) = file {
        if let Err(e) = f.flush().await {
            warn!(error = %e, "Failed to flush discovery feed");
        }
    }
    written
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

// ---------------------------------------------------------------------------
// Suggestion log
// ---------------------------------------------------------------------------

/// An operator suggestion raised by an escalated ripple target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub trigger: String,
    pub event: String,
    pub target: String,
    pub target_name: String,
    pub current_action: Option<Action>,
    pub suggested: Action,
    pub score: f64,
    pub paths: usize,
    pub time: String,
    pub timestamp: String,
}

impl Suggestion {
    pub fn escalation(report: &RippleReport, target: &RippleTarget) -> Self {
        Self {
            trigger: report.trigger.clone(),
            event: report.event.clone(),
            target: target.key.clone(),
            target_name: target.name.clone(),
            current_action: target.current_action,
            suggested: Action::ReachOut,
            score: target.score,
            paths: target.paths,
            time: Local::now().format("%H:%M").to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub struct SuggestionLog {
    path: PathBuf,
}

impl SuggestionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn append(&self, suggestions: &[Suggestion]) -> Result<usize, TigerclawError> {
        if suggestions.is_empty() {
            return Ok(0);
        }
        let mut buf = Vec::new();
        for s in suggestions {
            serde_json::to_writer(&mut buf, s)?;
            buf.push(b'\n');
        }
        let mut file = open_append(&self.path).await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(suggestions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn feed_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed").join(".discoveries.jsonl");
        let (feed, writer) = DiscoveryFeed::open(path.clone());
        feed.emit(FeedEntry::new(FeedStatus::Evaluating, "Jane Doe", "MIT CSAIL"));
        feed.emit(
            FeedEntry::new(FeedStatus::Found, "Jane Doe", "Photonic tensor cores").with_strength("STRONG"),
        );
        drop(feed);
        assert_eq!(writer.finish().await, 2);

        let entries = lines(&path);
        assert_eq!(entries[0]["status"], "evaluating");
        assert_eq!(entries[1]["strength"], "STRONG");
        assert!(entries[0].get("reason").is_none());
        assert_eq!(entries[0]["time"].as_str().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unwritable_feed_drops_entries_quietly() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let (feed, writer) = DiscoveryFeed::open(dir.path().to_path_buf());
        feed.emit(FeedEntry::new(FeedStatus::Progress, "scan", "1/4"));
        drop(feed);
        assert_eq!(writer.finish().await, 0);
    }

    #[test]
    fn disabled_feed_accepts_entries() {
        DiscoveryFeed::disabled().emit(FeedEntry::new(FeedStatus::Summary, "scan", "done"));
    }
}
