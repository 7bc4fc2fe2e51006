//! Network ingestion: turn a batch of scan candidates into people,
//! co-author ties, shared-institution ties and theme expertise.
//!
//! Ingestion records who is connected to whom. It never writes `action`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use tigerclaw_common::{is_likely_person_name, slugify, EntityKind, PersonType, RelType, SignalRecord};

use crate::props::{NodeRef, Props};
use crate::store::{upsert_mirrored, GraphError, GraphStore};

const INGEST_SOURCE: &str = "scan_ingest";
const SCAN_EXPERTISE_CONFIDENCE: f64 = 0.5;

/// Resolves a paper reference to its author list. `None` means unknown;
/// lookups never fail the batch.
#[async_trait]
pub trait CoauthorSource: Send + Sync {
    async fn coauthors(&self, paper_ref: &str) -> Option<Vec<String>>;
}

/// Source for runs with no enrichment data.
pub struct NoCoauthors;

#[async_trait]
impl CoauthorSource for NoCoauthors {
    async fn coauthors(&self, _paper_ref: &str) -> Option<Vec<String>> {
        None
    }
}

static ARXIV_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"arxiv\.org/(?:abs|html)/(\S+?)(?:v\d+)?$").unwrap());

/// arXiv id of an abs/html URL, version suffix removed.
pub fn arxiv_id(url: &str) -> Option<String> {
    ARXIV_ID
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical institution name and the patterns that identify it.
const INSTITUTION_ALIASES: &[(&str, &[&str])] = &[
    ("MIT", &["mit", "massachusetts institute of technology", "csail"]),
    ("Stanford", &["stanford"]),
    ("UC Berkeley", &["uc berkeley", "berkeley", "ucb"]),
    ("CMU", &["cmu", "carnegie mellon"]),
    ("UIUC", &["uiuc", "urbana-champaign", "university of illinois"]),
    ("MSU", &["msu", "michigan state"]),
    ("UofT", &["uoft", "university of toronto", "u of t"]),
    ("Tsinghua", &["tsinghua"]),
    ("TU Wien", &["tu wien", "vienna university of technology"]),
    ("Hebrew University", &["hebrew university", "huji"]),
    ("University of Washington", &["university of washington", "uw seattle", "paul g. allen school"]),
    ("UW Madison", &["uw madison", "uw-madison", "wisconsin-madison", "university of wisconsin"]),
    ("NUS", &["nus", "national university of singapore"]),
    ("Bar-Ilan", &["bar-ilan", "bar ilan"]),
    ("UC Riverside", &["uc riverside", "ucr"]),
    ("UCLA", &["ucla"]),
    ("TU Eindhoven", &["tu eindhoven", "eindhoven university", "tu/e"]),
    ("TU Ilmenau", &["tu ilmenau", "ilmenau"]),
    ("Fraunhofer", &["fraunhofer"]),
    ("Penn State", &["penn state", "pennsylvania state"]),
    ("Google", &["google", "deepmind"]),
    ("Meta", &["meta", "facebook", "fair"]),
    ("NVIDIA", &["nvidia"]),
    ("Samsung", &["samsung"]),
    ("Microsoft", &["microsoft"]),
    ("Apple", &["apple"]),
    ("Amazon", &["amazon", "aws"]),
];

static INSTITUTION_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    INSTITUTION_ALIASES
        .iter()
        .map(|(canonical, aliases)| {
            let alternation: Vec<String> = aliases.iter().map(|a| regex::escape(a)).collect();
            let pattern = format!(r"(?i)(?:^|[^a-z0-9])(?:{})(?:$|[^a-z0-9])", alternation.join("|"));
            (*canonical, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Canonical institutions mentioned in free-text background.
pub fn canonical_institutions(background: &str) -> Vec<&'static str> {
    INSTITUTION_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(background))
        .map(|(canonical, _)| *canonical)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub candidates: usize,
    pub references: usize,
    pub coauthor_edges: usize,
    pub affiliation_edges: usize,
    pub institution_edges: usize,
    pub theme_edges: usize,
    pub skipped_names: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub today: NaiveDate,
    pub dry_run: bool,
}

struct Candidate<'a> {
    slug: String,
    record: &'a SignalRecord,
}

/// Ingest a batch of enriched signal records.
///
/// Re-running the same batch against the same graph leaves node and edge
/// counts unchanged.
pub async fn ingest(
    store: &dyn GraphStore,
    coauthors: &dyn CoauthorSource,
    records: &[SignalRecord],
    opts: IngestOptions,
) -> Result<IngestStats, GraphError> {
    let mut stats = IngestStats {
        dry_run: opts.dry_run,
        ..Default::default()
    };

    let mut seen = BTreeSet::new();
    let mut candidates = Vec::new();
    for record in records.iter().filter(|r| r.entity == EntityKind::Person) {
        if !is_likely_person_name(&record.name) {
            debug!(name = %record.name, "Skipping implausible name");
            stats.skipped_names += 1;
            continue;
        }
        let slug = record.slug();
        if slug.is_empty() || !seen.insert(slug.clone()) {
            continue;
        }
        candidates.push(Candidate { slug, record });
    }
    let batch: BTreeSet<&str> = candidates.iter().map(|c| c.slug.as_str()).collect();

    // People
    for c in &candidates {
        stats.candidates += 1;
        if opts.dry_run {
            continue;
        }
        let node = NodeRef::person(c.slug.as_str());
        let mut attrs = Props::new()
            .with("name", c.record.name.trim())
            .with("last_seen", opts.today);
        // A prior co-author sighting is promoted; richer types are kept.
        if let Some(existing) = store.node(&node).await? {
            if existing.person_type() == Some(PersonType::Reference) {
                attrs.set("type", PersonType::ScanCandidate);
            }
        }
        let on_create = Props::new().with("type", PersonType::ScanCandidate);
        store.merge_node(&node, &on_create, &attrs).await?;
    }

    // Co-authors
    let mut references: BTreeSet<String> = BTreeSet::new();
    let mut coauthor_pairs: BTreeSet<(String, String)> = BTreeSet::new();
    for c in &candidates {
        let Some(paper) = c.record.paper_ref() else {
            continue;
        };
        let Some(authors) = coauthors.coauthors(paper).await else {
            continue;
        };
        let me = NodeRef::person(c.slug.as_str());
        for author in authors.iter().map(|a| a.trim()) {
            let slug = slugify(author);
            if slug == c.slug || slug.is_empty() || !is_likely_person_name(author) {
                continue;
            }
            let kind = if batch.contains(slug.as_str()) {
                PersonType::ScanCandidate
            } else {
                references.insert(slug.clone());
                PersonType::Reference
            };
            let pair = if c.slug < slug {
                (c.slug.clone(), slug.clone())
            } else {
                (slug.clone(), c.slug.clone())
            };
            coauthor_pairs.insert(pair);
            if opts.dry_run {
                continue;
            }
            let other = NodeRef::person(slug.as_str());
            let on_create = Props::new().with("name", author).with("type", kind);
            store.merge_node(&other, &on_create, &Props::new()).await?;
            let props = Props::new()
                .with("paper_url", paper)
                .with("source", INGEST_SOURCE);
            upsert_mirrored(store, &me, RelType::Coauthored, &other, &props).await?;
        }
    }
    stats.references = references.len();
    stats.coauthor_edges = coauthor_pairs.len() * 2;

    // Shared institutions
    let mut by_institution: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
    for c in &candidates {
        let Some(background) = c.record.affiliation_text() else {
            continue;
        };
        for inst in canonical_institutions(background) {
            by_institution.entry(inst).or_default().push(c.slug.as_str());
        }
    }
    for (inst, members) in &by_institution {
        let inst_node = NodeRef::institution(*inst);
        if !opts.dry_run {
            store.upsert_node(&inst_node, &Props::new()).await?;
        }
        for slug in members {
            stats.institution_edges += 1;
            if !opts.dry_run {
                let props = Props::new().with("source", INGEST_SOURCE);
                store
                    .upsert_edge(&NodeRef::person(*slug), RelType::AffiliatedWith, &inst_node, &props)
                    .await?;
            }
        }
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                stats.affiliation_edges += 1;
                if opts.dry_run {
                    continue;
                }
                let props = Props::new().with("context", *inst).with("source", INGEST_SOURCE);
                store
                    .upsert_edge(&NodeRef::person(*a), RelType::WorkedWith, &NodeRef::person(*b), &props)
                    .await?;
            }
        }
    }

    // Theme expertise
    for c in &candidates {
        let Some(theme) = c.record.primary_theme() else {
            continue;
        };
        if opts.dry_run {
            stats.theme_edges += 1;
            continue;
        }
        let props = Props::new()
            .with("type", "scan")
            .with("confidence", SCAN_EXPERTISE_CONFIDENCE);
        match store
            .upsert_edge(&NodeRef::person(c.slug.as_str()), RelType::HasExpertiseIn, &NodeRef::theme(theme), &props)
            .await
        {
            Ok(()) => stats.theme_edges += 1,
            Err(GraphError::MissingEndpoint { .. }) => {
                warn!(theme, slug = %c.slug, "Theme not in graph, skipping expertise edge");
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        candidates = stats.candidates,
        references = stats.references,
        coauthor_edges = stats.coauthor_edges,
        affiliation_edges = stats.affiliation_edges,
        institution_edges = stats.institution_edges,
        theme_edges = stats.theme_edges,
        dry_run = opts.dry_run,
        "Network ingestion complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arxiv_ids_drop_version_suffix() {
        assert_eq!(arxiv_id("https://arxiv.org/abs/2401.01234v3").as_deref(), Some("2401.01234"));
        assert_eq!(arxiv_id("https://arxiv.org/html/2401.01234").as_deref(), Some("2401.01234"));
        assert_eq!(arxiv_id("https://arxiv.org/abs/cs/0112017v1").as_deref(), Some("cs/0112017"));
        assert_eq!(arxiv_id("https://example.com/paper.pdf"), None);
    }

    #[test]
    fn institutions_match_on_word_boundaries() {
        assert_eq!(canonical_institutions("PhD student, MIT CSAIL"), vec!["MIT"]);
        assert_eq!(canonical_institutions("Stanford; previously Google DeepMind"), vec!["Stanford", "Google"]);
        assert!(canonical_institutions("Submitted to a summit").is_empty());
        assert!(canonical_institutions("metamaterials lab").is_empty());
    }
}
