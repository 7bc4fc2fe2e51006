//! Pipeline index store: load, atomic save, and per-record persistence under
//! the advisory lock.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tigerclaw_common::{
    is_likely_person_name, Action, EntityKind, IndexEntry, PersonType, PipelineIndex, SignalRecord, TigerclawError,
};

use crate::lock::PipelineLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistError {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct PersistedEntry {
    pub kind: EntityKind,
    pub slug: String,
    pub entry: IndexEntry,
}

#[derive(Debug, Clone, Default)]
pub struct PersistOutcome {
    pub persisted: Vec<PersistedEntry>,
    pub errors: Vec<PersistError>,
}

pub struct IndexStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_wait: Duration,
    lock_stale: Duration,
    // Serializes writers inside this process; the file lock covers the rest.
    writer: Mutex<()>,
}

impl IndexStore {
    pub fn new(path: PathBuf, lock_path: PathBuf, lock_wait: Duration, lock_stale: Duration) -> Self {
        Self {
            path,
            lock_path,
            lock_wait,
            lock_stale,
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the index. A missing file is an empty index; an unreadable or
    /// malformed one is an error.
    pub fn load(&self) -> Result<PipelineIndex, TigerclawError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PipelineIndex::default()),
            Err(e) => return Err(TigerclawError::Index(format!("{}: {e}", self.path.display()))),
        };
        serde_json::from_str(&raw).map_err(|e| TigerclawError::Index(format!("{}: {e}", self.path.display())))
    }

    /// Replace the index file atomically (temp file in the same directory,
    /// then rename).
    pub fn save(&self, index: &PipelineIndex) -> Result<(), TigerclawError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, index)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| TigerclawError::Io(e.error))?;
        Ok(())
    }

    /// Persist scored records. Each record is applied and written on its own;
    /// a failing record is reported and the rest continue. Failing to take the
    /// lock or read the index fails the whole call.
    pub async fn persist(&self, records: &[SignalRecord], today: NaiveDate) -> Result<PersistOutcome, TigerclawError> {
        let _writer = self.writer.lock().await;
        let _lock = PipelineLock::acquire(&self.lock_path, self.lock_wait, self.lock_stale).await?;
        let mut index = self.load()?;

        let mut outcome = PersistOutcome::default();
        for record in records {
            let mut candidate = index.clone();
            let applied = apply_record(&mut candidate, record, today).and_then(|persisted| {
                candidate.updated_at = Some(today);
                self.save(&candidate)?;
                Ok(persisted)
            });
            match applied {
                Ok(persisted) => {
                    info!(slug = %persisted.slug, action = ?persisted.entry.action, "Persisted");
                    index = candidate;
                    outcome.persisted.push(persisted);
                }
                Err(e) => {
                    warn!(error = %e, name = %record.name, "Failed to persist record, continuing");
                    outcome.errors.push(PersistError {
                        name: record.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }
}

/// Merge a scored record into the index. Operator-owned fields (linear,
/// memo, relationship hints) survive; scan fields refresh.
pub fn apply_record(index: &mut PipelineIndex, record: &SignalRecord, today: NaiveDate) -> Result<PersistedEntry, TigerclawError> {
    let name = record.name.trim();
    let slug = record.slug();
    if slug.is_empty() {
        return Err(TigerclawError::Validation(format!("no usable slug for '{name}'")));
    }
    if record.entity == EntityKind::Person && !is_likely_person_name(name) {
        return Err(TigerclawError::Validation(format!("'{name}' is not a person name")));
    }

    let kind = record.entity;
    let mut entry = index.get(kind, &slug).cloned().unwrap_or_else(|| IndexEntry::new(name));

    entry.name = name.to_string();
    entry.action = Some(record.action.unwrap_or(Action::Watch));
    entry.theme = record.primary_theme().map(String::from).or(entry.theme);
    entry.last_seen = Some(today);
    entry.signal_strength = record.signal_strength.or(entry.signal_strength);
    entry.thesis_fit = record.thesis_fit.or(entry.thesis_fit);
    entry.work = record.work.clone().or(entry.work);
    entry.background = record.affiliation_text().map(String::from).or(entry.background);
    entry.product = record.product.clone().or(entry.product);
    entry.funded = record.funded.or(entry.funded);
    for (key, url) in record.links.entries() {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            continue;
        };
        let slot = match key {
            "github" => &mut entry.links.github,
            "linkedin" => &mut entry.links.linkedin,
            "arxiv" => &mut entry.links.arxiv,
            "twitter" => &mut entry.links.twitter,
            _ => &mut entry.links.website,
        };
        *slot = Some(url.to_string());
    }
    if kind == EntityKind::Person && entry.kind.is_none() {
        entry.kind = Some(PersonType::LatentFounder);
    }

    index.upsert(kind, slug.clone(), entry.clone());
    Ok(PersistedEntry { kind, slug, entry })
}
