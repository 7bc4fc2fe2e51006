// Test mocks for the scout pipeline.
//
// Two mocks matching the two collaborator boundaries:
// - MockScanner (Scanner): target→records map, with failing and hanging targets
// - MockCoauthors (CoauthorSource): paper ref→author list
//
// Plus helpers for building signal records and a theme catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use tigerclaw_common::SignalRecord;
use tigerclaw_graph::CoauthorSource;

use crate::catalog::{CatalogTheme, ThemeCatalog};
use crate::scanner::{ScanJob, Scanner};

// ---------------------------------------------------------------------------
// MockScanner
// ---------------------------------------------------------------------------

/// Returns canned records keyed by job target (`brave:THE-1`). Unknown
/// targets return an empty batch.
#[derive(Default)]
pub struct MockScanner {
    results: HashMap<String, Vec<SignalRecord>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, target: &str, records: Vec<SignalRecord>) -> Self {
        self.results.insert(target.to_string(), records);
        self
    }

    pub fn failing(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    /// The job never finishes on its own; only a timeout or abort ends it.
    pub fn hanging(mut self, target: &str) -> Self {
        self.hanging.insert(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl Scanner for MockScanner {
    async fn scan(&self, job: &ScanJob) -> Result<Vec<SignalRecord>> {
        let target = job.target();
        self.calls.lock().unwrap().push(target.clone());
        if self.hanging.contains(&target) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(&target) {
            bail!("mock failure for {target}");
        }
        Ok(self.results.get(&target).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockCoauthors
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockCoauthors {
    papers: HashMap<String, Vec<String>>,
}

impl MockCoauthors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paper(mut self, paper_ref: &str, authors: &[&str]) -> Self {
        self.papers
            .insert(paper_ref.to_string(), authors.iter().map(|a| a.to_string()).collect());
        self
    }
}

#[async_trait]
impl CoauthorSource for MockCoauthors {
    async fn coauthors(&self, paper_ref: &str) -> Option<Vec<String>> {
        self.papers.get(paper_ref).cloned()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a signal record from loose JSON, the way scanners emit them.
pub fn signal(value: serde_json::Value) -> SignalRecord {
    serde_json::from_value(value).expect("test signal must deserialize")
}

pub fn theme(key: &str, title: &str, domain: &str) -> CatalogTheme {
    CatalogTheme {
        key: key.to_string(),
        title: title.to_string(),
        domain: Some(domain.to_string()),
        ..Default::default()
    }
}

pub fn catalog(themes: Vec<CatalogTheme>) -> ThemeCatalog {
    ThemeCatalog::new(themes)
}
