//! Scan orchestrator.
//!
//! Fan-out runs one task per (theme or domain) × source, bounded by a
//! semaphore and a per-task time cap. Fan-in (merge, diff, ingest, score,
//! persist, detect) runs sequentially on the caller's task, so the graph, the
//! index and the feed each have a single writer.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use tigerclaw_common::{Action, Band, EntityKind, SignalRecord, SignalStrength, TigerclawError};
use tigerclaw_graph::themes::ProposalSource;
use tigerclaw_graph::{
    detect_all, discover, ingest, proximity_bonus, sync_entry, CoauthorSource, CompoundHit, DiscoveryCandidate,
    DiscoveryConfig, GraphStore, IngestOptions, IngestStats, NoCoauthors, NodeRef, Strategy, ThemeProposal,
};

use crate::catalog::{CatalogTheme, ThemeCatalog};
use crate::diff::{diff, DiffEntry, DiffStatus, FieldChange};
use crate::feed::{DiscoveryFeed, FeedEntry, FeedStatus};
use crate::index::{IndexStore, PersistError};
use crate::merge::{dedup, prepare};
use crate::rubric::{decide_action, score_extended, scored_strength, ScoringAttrs};
use crate::scanner::{ScanJob, Scanner, Source};

const MULTI_SOURCE_MIN_CONCURRENCY: usize = 6;
const DETAIL_WORK_CHARS: usize = 60;

// ---------------------------------------------------------------------------
// Deps, options, abort
// ---------------------------------------------------------------------------

#[derive(Clone, TypedBuilder)]
pub struct ScanDeps {
    pub scanner: Arc<dyn Scanner>,
    pub catalog: Arc<ThemeCatalog>,
    pub index: Arc<IndexStore>,
    #[builder(default)]
    pub graph: Option<Arc<dyn GraphStore>>,
    #[builder(default = Arc::new(NoCoauthors))]
    pub coauthors: Arc<dyn CoauthorSource>,
    #[builder(default)]
    pub feed: DiscoveryFeed,
    #[builder(default = Duration::from_secs(180))]
    pub search_timeout: Duration,
    #[builder(default = Duration::from_secs(120))]
    pub aux_timeout: Duration,
}

impl ScanDeps {
    fn time_cap(&self, source: Source) -> Duration {
        if source.is_primary() {
            self.search_timeout
        } else {
            self.aux_timeout
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Theme keys to scan; empty means every catalog theme.
    pub themes: Vec<String>,
    /// Non-empty switches to domain-driven mode.
    pub domains: Vec<String>,
    pub sources: Vec<Source>,
    pub concurrency: usize,
    pub persist: bool,
    pub discover: bool,
    pub dry_run: bool,
    pub today: NaiveDate,
}

impl ScanOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            themes: Vec::new(),
            domains: Vec::new(),
            sources: vec![Source::Brave],
            concurrency: 4,
            persist: true,
            discover: false,
            dry_run: false,
            today,
        }
    }
}

/// Read side of the abort flag.
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

impl AbortSignal {
    pub fn pair() -> (AbortHandle, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (AbortHandle { tx }, AbortSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            // Handle dropped without aborting.
            std::future::pending::<()>().await;
        }
    }
}

/// First Ctrl-C aborts the scan; a second exits the process.
pub fn install_interrupt_handler() -> AbortSignal {
    let (handle, signal) = AbortSignal::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing with partial results (interrupt again to exit)");
        handle.abort();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });
    signal
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    Theme,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPlan {
    pub mode: PlanMode,
    pub sources: Vec<Source>,
    pub concurrency: usize,
    /// Themes whose counts are tracked in the report.
    pub themes: Vec<String>,
    pub jobs: Vec<ScanJob>,
}

pub fn effective_concurrency(requested: usize, sources: usize) -> usize {
    let requested = requested.max(1);
    if sources > 1 {
        requested.max(MULTI_SOURCE_MIN_CONCURRENCY)
    } else {
        requested
    }
}

/// Build the fan-out plan. Domain-driven when domains are given (primary
/// search only), theme-driven otherwise.
pub fn plan(catalog: &ThemeCatalog, opts: &ScanOptions) -> Result<ScanPlan, TigerclawError> {
    let mut sources = opts.sources.clone();
    if sources.is_empty() {
        sources.push(Source::Brave);
    }
    sources.sort();
    sources.dedup();

    if !opts.domains.is_empty() {
        let jobs: Vec<ScanJob> = opts
            .domains
            .iter()
            .map(|domain| ScanJob {
                source: Source::Brave,
                theme_key: None,
                domain: domain.clone(),
                query: domain.clone(),
            })
            .collect();
        let themes = opts
            .domains
            .iter()
            .flat_map(|d| catalog.in_domain(d))
            .map(|t| t.key.clone())
            .collect();
        return Ok(ScanPlan {
            mode: PlanMode::Domain,
            concurrency: effective_concurrency(opts.concurrency, 1),
            sources: vec![Source::Brave],
            themes,
            jobs,
        });
    }

    let selected: Vec<&CatalogTheme> = if opts.themes.is_empty() {
        catalog.themes().iter().collect()
    } else {
        opts.themes
            .iter()
            .map(|key| {
                catalog
                    .get(key)
                    .ok_or_else(|| TigerclawError::Validation(format!("unknown theme '{key}'")))
            })
            .collect::<Result<_, _>>()?
    };
    if selected.is_empty() {
        return Err(TigerclawError::Validation(
            "nothing to scan: the theme catalog is empty and no domains were given".into(),
        ));
    }

    let mut jobs = Vec::new();
    let mut themes = Vec::new();
    for theme in selected {
        let Some(domain) = theme.domain.as_deref() else {
            warn!(theme = %theme.key, "Theme has no domain, skipping");
            continue;
        };
        themes.push(theme.key.clone());
        let query = theme.query();
        for source in &sources {
            jobs.push(ScanJob {
                source: *source,
                theme_key: Some(theme.key.clone()),
                domain: domain.to_string(),
                query: query.clone(),
            });
        }
    }

    Ok(ScanPlan {
        mode: PlanMode::Theme,
        concurrency: effective_concurrency(opts.concurrency, sources.len()),
        sources,
        themes,
        jobs,
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTarget {
    pub target: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResults {
    pub total_raw: usize,
    pub total_deduped: usize,
    pub new: usize,
    pub changed: usize,
    pub known: usize,
    pub dropped: usize,
    pub persisted: usize,
    pub errors: Vec<PersistError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThemeCounts {
    pub title: String,
    pub domain: Option<String>,
    pub total: usize,
    pub new: usize,
    pub changed: usize,
    pub known: usize,
}

/// Outcome for one NEW or CHANGED signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredSignal {
    pub name: String,
    pub slug: String,
    pub diff: DiffStatus,
    pub score: i32,
    pub strength: Band,
    pub graph_bonus: i32,
    /// `PASS - low score` style label.
    pub action: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub dry_run: bool,
    pub plan: ScanPlan,
    pub failed: Vec<FailedTarget>,
    pub concurrency: usize,
    pub aborted: bool,
    pub results: ScanResults,
    pub signals: Vec<ScoredSignal>,
    pub per_theme: BTreeMap<String, ThemeCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestStats>,
    pub theme_proposals: Vec<ThemeProposal>,
    pub compound_signals: Vec<CompoundHit>,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.results;
        writeln!(f, "=== Scan Complete ({}) ===", self.scan_id)?;
        writeln!(
            f,
            "Duration: {}s | Targets: {} | Raw: {} | Deduped: {}",
            self.duration_seconds,
            self.plan.jobs.len(),
            r.total_raw,
            r.total_deduped
        )?;
        writeln!(f, "New: {} | Changed: {} | Known: {} | Dropped: {}", r.new, r.changed, r.known, r.dropped)?;
        writeln!(f, "Persisted: {} | Errors: {}", r.persisted, r.errors.len())?;
        if !self.theme_proposals.is_empty() {
            writeln!(f, "Theme proposals: {}", self.theme_proposals.len())?;
        }
        if !self.compound_signals.is_empty() {
            writeln!(f, "Compound signals: {}", self.compound_signals.len())?;
        }
        if !self.failed.is_empty() {
            let targets: Vec<&str> = self.failed.iter().map(|t| t.target.as_str()).collect();
            writeln!(f, "Failed targets: {}", targets.join(", "))?;
        }
        if self.aborted {
            writeln!(f, "Aborted: partial results")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

enum JobFailure {
    Skipped,
    Aborted,
    TimedOut(Duration),
    Failed(String),
}

struct JobOutcome {
    job: ScanJob,
    result: Result<Vec<SignalRecord>, JobFailure>,
}

fn spawn_jobs(deps: &ScanDeps, plan: &ScanPlan, abort: &AbortSignal) -> JoinSet<JobOutcome> {
    let semaphore = Arc::new(Semaphore::new(plan.concurrency));
    let mut set = JoinSet::new();
    for job in plan.jobs.iter().cloned() {
        let semaphore = semaphore.clone();
        let scanner = deps.scanner.clone();
        let cap = deps.time_cap(job.source);
        let mut abort = abort.clone();
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return JobOutcome {
                    job,
                    result: Err(JobFailure::Skipped),
                };
            };
            if abort.is_aborted() {
                return JobOutcome {
                    job,
                    result: Err(JobFailure::Skipped),
                };
            }
            let result = tokio::select! {
                r = tokio::time::timeout(cap, scanner.scan(&job)) => match r {
                    Ok(Ok(records)) => Ok(records),
                    Ok(Err(e)) => Err(JobFailure::Failed(e.to_string())),
                    Err(_) => Err(JobFailure::TimedOut(cap)),
                },
                _ = abort.aborted() => Err(JobFailure::Aborted),
            };
            JobOutcome { job, result }
        });
    }
    set
}

/// Stamp job context on a raw record and run the per-record merge pre-pass.
fn tag(record: &mut SignalRecord, job: &ScanJob, themes_in_domain: &[&CatalogTheme]) {
    if record.provenance.source.is_none() {
        record.provenance.source = Some(job.source.to_string());
    }
    if let Some(key) = &job.theme_key {
        if record.provenance.themes.is_empty() {
            record.provenance.themes = vec![key.clone()];
            record.provenance.theme_relevance = BTreeMap::from([(key.clone(), 1.0)]);
        }
    }
    prepare(record, &job.domain, themes_in_domain);
}

fn signal_detail(record: &SignalRecord) -> String {
    let work: String = record
        .work
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(DETAIL_WORK_CHARS)
        .collect();
    format!("{} — {work}", record.affiliation_text().unwrap_or("unknown"))
}

/// Names that may enter the diff. Placeholder and junk people are dropped.
fn is_real_name(record: &SignalRecord) -> bool {
    match record.entity {
        EntityKind::Person => record.is_named(),
        EntityKind::Company => !record.slug().is_empty(),
    }
}

fn progress(feed: &DiscoveryFeed, detail: impl Into<String>) {
    feed.emit(FeedEntry::new(FeedStatus::Progress, "—", detail));
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

struct Scored {
    entry: DiffEntry,
    signal: ScoredSignal,
}

async fn score_entry(graph: Option<&dyn GraphStore>, mut entry: DiffEntry) -> Scored {
    let attrs = ScoringAttrs::from_signal(&entry.record);
    let mut result = score_extended(&attrs);

    let mut graph_bonus = 0;
    if let Some(store) = graph.filter(|_| !attrs.already_funded) {
        let node = match entry.record.entity {
            EntityKind::Person => NodeRef::person(entry.slug.as_str()),
            EntityKind::Company => NodeRef::company(entry.slug.as_str()),
        };
        match proximity_bonus(store, &node, false).await {
            Ok(proximity) => {
                graph_bonus = proximity.bonus;
                result.apply_proximity(&proximity);
            }
            Err(e) => debug!(error = %e, slug = %entry.slug, "No graph bonus"),
        }
    }

    let decision = decide_action(&result, entry.record.thesis_fit);
    entry.record.signal_strength = scored_strength(&result, entry.record.signal_strength);
    entry.record.action = Some(decision.action);

    let signal = ScoredSignal {
        name: entry.record.name.clone(),
        slug: entry.slug.clone(),
        diff: entry.status,
        score: result.score,
        strength: result.strength,
        graph_bonus,
        action: decision.label(),
        changes: entry.changes.clone(),
    };
    Scored { entry, signal }
}

fn verdict_entry(scored: &Scored) -> FeedEntry {
    let record = &scored.entry.record;
    if scored.entry.status == DiffStatus::Changed {
        let fields: Vec<&str> = scored.entry.changes.iter().map(|c| c.field.as_str()).collect();
        return FeedEntry::new(FeedStatus::Watching, &record.name, format!("UPDATED — {}", fields.join(", ")));
    }
    let detail = signal_detail(record);
    match record.action {
        Some(Action::ReachOut) => {
            let strength = record.signal_strength.map(|s| s.as_str()).unwrap_or("medium");
            FeedEntry::new(FeedStatus::Found, &record.name, detail).with_strength(strength.to_uppercase())
        }
        Some(Action::Watch) => FeedEntry::new(FeedStatus::Watching, &record.name, detail),
        _ => {
            let reason = scored.signal.action.split(" - ").nth(1).unwrap_or("low score");
            FeedEntry::new(FeedStatus::Disqualified, &record.name, detail).with_reason(reason)
        }
    }
}

fn proposal_entry(proposal: &ThemeProposal) -> FeedEntry {
    let source = match proposal.source {
        ProposalSource::OrphanCluster => "orphan_cluster",
        ProposalSource::BridgeNode => "bridge_node",
        ProposalSource::AffiliationAnomaly => "affiliation_anomaly",
    };
    let status = if proposal.confidence == SignalStrength::Weak {
        FeedStatus::Watching
    } else {
        FeedStatus::Found
    };
    let strength = if proposal.confidence == SignalStrength::Strong {
        "STRONG"
    } else {
        "MEDIUM"
    };
    FeedEntry::new(
        status,
        &proposal.suggested_title,
        format!("THEME PROPOSAL ({source}) — {}", proposal.primitive),
    )
    .with_strength(strength)
}

/// Run a scan end to end.
///
/// Fatal errors are an unreadable index and a lock that is never acquired.
/// Graph and scanner failures degrade the run and are reported.
pub async fn run(deps: &ScanDeps, opts: &ScanOptions, abort: AbortSignal) -> Result<ScanReport, TigerclawError> {
    let started_at = Utc::now();
    let scan_id = format!("ps-{}", started_at.format("%Y-%m-%dT%H-%M-%SZ"));
    let plan = plan(&deps.catalog, opts)?;
    info!(
        scan_id = %scan_id,
        mode = ?plan.mode,
        jobs = plan.jobs.len(),
        concurrency = plan.concurrency,
        "Scan planned"
    );

    let mut report = ScanReport {
        scan_id,
        started_at,
        completed_at: started_at,
        duration_seconds: 0,
        dry_run: opts.dry_run,
        concurrency: plan.concurrency,
        failed: Vec::new(),
        aborted: false,
        results: ScanResults::default(),
        signals: Vec::new(),
        per_theme: BTreeMap::new(),
        ingest: None,
        theme_proposals: Vec::new(),
        compound_signals: Vec::new(),
        plan,
    };
    if opts.dry_run {
        return Ok(finish(report));
    }

    // Read the index before spending time on scanners.
    let index = deps.index.load()?;
    let graph = deps.graph.as_deref();
    if let Some(store) = graph {
        let written = deps.catalog.sync_to_graph(store).await;
        debug!(themes = written, "Themes synced to graph");
    }

    for key in &report.plan.themes {
        if let Some(theme) = deps.catalog.get(key) {
            report.per_theme.insert(
                key.clone(),
                ThemeCounts {
                    title: theme.title.clone(),
                    domain: theme.domain.clone(),
                    ..Default::default()
                },
            );
        }
    }

    // Fan-out
    let mut set = spawn_jobs(deps, &report.plan, &abort);
    let total_jobs = report.plan.jobs.len();
    let mut raw: Vec<SignalRecord> = Vec::new();
    let mut evaluating: HashSet<String> = HashSet::new();
    let mut done = 0;
    while let Some(joined) = set.join_next().await {
        done += 1;
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Scan task panicked");
                continue;
            }
        };
        let target = outcome.job.target();
        match outcome.result {
            Ok(records) => {
                let themes_in_domain = deps.catalog.in_domain(&outcome.job.domain);
                for mut record in records {
                    tag(&mut record, &outcome.job, &themes_in_domain);
                    if record.is_named() && evaluating.insert(record.name.trim().to_lowercase()) {
                        deps.feed
                            .emit(FeedEntry::new(FeedStatus::Evaluating, record.name.trim(), signal_detail(&record)));
                    }
                    raw.push(record);
                }
            }
            Err(JobFailure::Skipped) => debug!(target = %target, "Not started, scan aborted"),
            Err(JobFailure::Aborted) => report.failed.push(FailedTarget {
                target,
                error: "aborted".to_string(),
            }),
            Err(JobFailure::TimedOut(cap)) => {
                warn!(target = %target, cap_secs = cap.as_secs(), "Scan target timed out");
                report.failed.push(FailedTarget {
                    target,
                    error: format!("timed out after {}s", cap.as_secs()),
                });
            }
            Err(JobFailure::Failed(error)) => {
                warn!(target = %target, error = %error, "Scan target failed");
                report.failed.push(FailedTarget { target, error });
            }
        }
        progress(&deps.feed, format!("Scanned {done}/{total_jobs} targets, {} signals", raw.len()));
    }
    report.aborted = abort.is_aborted();

    // Fan-in: merge and diff
    report.results.total_raw = raw.len();
    let merged = dedup(raw);
    report.results.total_deduped = merged.len();
    for record in &merged {
        for key in &record.provenance.themes {
            if let Some(counts) = report.per_theme.get_mut(key) {
                counts.total += 1;
            }
        }
    }
    let (named, junk): (Vec<SignalRecord>, Vec<SignalRecord>) = merged.into_iter().partition(is_real_name);
    report.results.dropped = junk.len();
    progress(
        &deps.feed,
        format!("Merged {} → {} signals, running diff...", report.results.total_raw, report.results.total_deduped),
    );

    let scan_diff = diff(named, &index);
    report.results.new = scan_diff.new.len();
    report.results.changed = scan_diff.changed.len();
    report.results.known = scan_diff.known.len();
    info!(diff = %scan_diff.summary(), dropped = report.results.dropped, "Diff complete");
    progress(&deps.feed, format!("Diff: {} — ingesting network...", scan_diff.summary()));

    // Ingest every named sighting so proximity sees this batch's ties.
    if let Some(store) = graph {
        let batch: Vec<SignalRecord> = scan_diff
            .new
            .iter()
            .chain(&scan_diff.changed)
            .chain(&scan_diff.known)
            .map(|e| e.record.clone())
            .collect();
        let options = IngestOptions {
            today: opts.today,
            dry_run: false,
        };
        match ingest(store, deps.coauthors.as_ref(), &batch, options).await {
            Ok(stats) => report.ingest = Some(stats),
            Err(e) => warn!(error = %e, "Network ingestion failed, scoring without new ties"),
        }
    }

    // Score
    let mut scored = Vec::new();
    for entry in scan_diff.new.into_iter().chain(scan_diff.changed) {
        let s = score_entry(graph, entry).await;
        deps.feed.emit(verdict_entry(&s));
        for key in &s.entry.record.provenance.themes {
            if let Some(counts) = report.per_theme.get_mut(key) {
                match s.entry.status {
                    DiffStatus::New => counts.new += 1,
                    _ => counts.changed += 1,
                }
            }
        }
        scored.push(s);
    }
    for entry in &scan_diff.known {
        for key in &entry.record.provenance.themes {
            if let Some(counts) = report.per_theme.get_mut(key) {
                counts.known += 1;
            }
        }
    }

    // Theme discovery
    if opts.discover {
        let candidates: Vec<DiscoveryCandidate> = scored
            .iter()
            .map(|s| DiscoveryCandidate {
                name: s.entry.record.name.clone(),
                score: s.signal.score,
                best_relevance: s.entry.record.best_relevance(),
                keywords: s.entry.record.provenance.keywords.iter().cloned().collect(),
            })
            .collect();
        let proposals = discover(
            graph,
            &candidates,
            Strategy::All,
            &DiscoveryConfig::default(),
            &deps.catalog.titles(),
        )
        .await;
        for proposal in &proposals {
            deps.feed.emit(proposal_entry(proposal));
        }
        report.theme_proposals = proposals;
    }

    // Persist
    if opts.persist {
        let to_persist: Vec<SignalRecord> = scored
            .iter()
            .filter(|s| matches!(s.entry.record.action, Some(Action::ReachOut | Action::Watch)))
            .map(|s| s.entry.record.clone())
            .collect();
        if !to_persist.is_empty() {
            progress(&deps.feed, format!("Persisting {} signals...", to_persist.len()));
            let outcome = deps.index.persist(&to_persist, opts.today).await?;
            report.results.persisted = outcome.persisted.len();
            report.results.errors = outcome.errors;

            if let Some(store) = graph {
                for p in &outcome.persisted {
                    if let Err(e) = sync_entry(store, p.kind, &p.slug, &p.entry).await {
                        warn!(error = %e, slug = %p.slug, "Failed to sync persisted entry to graph");
                    }
                }
            }
        }
    }

    // Compound patterns
    if let Some(store) = graph {
        let hits = detect_all(store, opts.today).await;
        for hit in &hits {
            deps.feed.emit(
                FeedEntry::new(FeedStatus::Compound, &hit.name, &hit.detail)
                    .with_strength(hit.strength.as_str().to_uppercase()),
            );
        }
        report.compound_signals = hits;
    }

    // Summary
    let count = |action: Action| scored.iter().filter(|s| s.entry.record.action == Some(action)).count();
    let summary_name = if report.plan.mode == PlanMode::Domain {
        opts.domains.join(", ")
    } else {
        report.plan.themes.join(", ")
    };
    deps.feed.emit(
        FeedEntry::new(
            FeedStatus::Summary,
            summary_name,
            format!(
                "{} reach out · {} watch · {} pass · {} dropped",
                count(Action::ReachOut),
                count(Action::Watch),
                count(Action::Pass),
                report.results.dropped
            ),
        )
        .with_results(serde_json::json!(report.results.total_deduped)),
    );

    report.signals = scored.into_iter().map(|s| s.signal).collect();
    Ok(finish(report))
}

fn finish(mut report: ScanReport) -> ScanReport {
    report.completed_at = Utc::now();
    report.duration_seconds = (report.completed_at - report.started_at).num_seconds();
    info!("\n{report}");
    report
}
