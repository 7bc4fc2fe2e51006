//! File-per-entry enrichment cache with per-source TTLs.
//!
//! Layout: `<dir>/<source>/<id>.json`, `/` in ids replaced by `_`. Expired
//! and malformed entries read as misses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tigerclaw_common::TigerclawError;
use tigerclaw_graph::ingest::arxiv_id;
use tigerclaw_graph::CoauthorSource;

pub const DEFAULT_TTL_DAYS: i64 = 14;

/// Known sources and their freshness windows in days.
pub const SOURCE_TTLS: &[(&str, i64)] = &[("github", 7), ("arxiv", 30), ("web", 14), ("linkedin", 14)];

pub fn ttl_days(source: &str) -> i64 {
    SOURCE_TTLS
        .iter()
        .find(|(s, _)| *s == source)
        .map(|(_, ttl)| *ttl)
        .unwrap_or(DEFAULT_TTL_DAYS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub source: String,
    pub id: String,
    pub fetched_at: DateTime<Utc>,
    pub ttl_days: i64,
    pub data: serde_json::Value,
}

impl CacheEntry {
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.fetched_at).num_days()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.age_days(now) > ttl_days(&self.source)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub entries: usize,
    pub expired: usize,
    pub malformed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub sources: BTreeMap<String, SourceStats>,
    pub total_entries: usize,
    pub total_expired: usize,
}

pub struct EnrichmentCache {
    dir: PathBuf,
}

enum Slot {
    Fresh(CacheEntry),
    Expired,
    Malformed,
}

impl EnrichmentCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, source: &str, id: &str) -> PathBuf {
        self.dir.join(source).join(format!("{}.json", id.replace('/', "_")))
    }

    async fn read_slot(path: &Path, now: DateTime<Utc>) -> std::io::Result<Slot> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_expired(now) => Slot::Expired,
            Ok(entry) => Slot::Fresh(entry),
            Err(_) => Slot::Malformed,
        })
    }

    /// Fresh cached payload, or `None` on a miss of any kind.
    pub async fn get(&self, source: &str, id: &str) -> Option<CacheEntry> {
        let path = self.entry_path(source, id);
        match Self::read_slot(&path, Utc::now()).await {
            Ok(Slot::Fresh(entry)) => Some(entry),
            Ok(Slot::Expired) => {
                debug!(source, id, "Cache entry expired");
                None
            }
            Ok(Slot::Malformed) => {
                warn!(path = %path.display(), "Malformed cache entry, treating as miss");
                None
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Unreadable cache entry, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, source: &str, id: &str, data: serde_json::Value) -> Result<CacheEntry, TigerclawError> {
        let entry = CacheEntry {
            source: source.to_string(),
            id: id.to_string(),
            fetched_at: Utc::now(),
            ttl_days: ttl_days(source),
            data,
        };
        let path = self.entry_path(source, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut raw = serde_json::to_vec_pretty(&entry)?;
        raw.push(b'\n');
        tokio::fs::write(&path, raw).await?;
        Ok(entry)
    }

    async fn entry_files(&self, source: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(self.dir.join(source)).await else {
            return files;
        };
        while let Ok(Some(item)) = dir.next_entry().await {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let mut stats = CacheStats::default();
        for (source, _) in SOURCE_TTLS {
            let mut s = SourceStats::default();
            for path in self.entry_files(source).await {
                s.entries += 1;
                match Self::read_slot(&path, now).await {
                    Ok(Slot::Expired) => s.expired += 1,
                    Ok(Slot::Malformed) => s.malformed += 1,
                    _ => {}
                }
            }
            stats.total_entries += s.entries;
            stats.total_expired += s.expired;
            stats.sources.insert(source.to_string(), s);
        }
        stats
    }

    /// Delete expired and malformed entries. Returns how many were removed.
    pub async fn prune(&self) -> Result<usize, TigerclawError> {
        let now = Utc::now();
        let mut pruned = 0;
        for (source, _) in SOURCE_TTLS {
            for path in self.entry_files(source).await {
                if matches!(Self::read_slot(&path, now).await, Ok(Slot::Expired | Slot::Malformed)) {
                    tokio::fs::remove_file(&path).await?;
                    pruned += 1;
                }
            }
        }
        Ok(pruned)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Author {
    Name(String),
    Object { name: String },
}

impl Author {
    fn into_name(self) -> String {
        match self {
            Author::Name(name) | Author::Object { name } => name,
        }
    }
}

/// Author list of a cached arXiv payload: top-level `authors`, else
/// `data.authors`.
fn authors_of(data: &serde_json::Value) -> Option<Vec<String>> {
    let list = data
        .get("authors")
        .or_else(|| data.get("data").and_then(|d| d.get("authors")))?;
    let authors: Vec<Author> = serde_json::from_value(list.clone()).ok()?;
    Some(authors.into_iter().map(Author::into_name).collect())
}

#[async_trait]
impl CoauthorSource for EnrichmentCache {
    async fn coauthors(&self, paper_ref: &str) -> Option<Vec<String>> {
        let id = arxiv_id(paper_ref)?;
        let entry = self.get("arxiv", &id).await?;
        let authors = authors_of(&entry.data);
        if authors.is_none() {
            debug!(id = %id, "Cached paper has no author list");
        }
        authors
    }
}
