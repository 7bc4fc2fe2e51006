//! Theme discovery: find coherent activity the current theme catalog does
//! not cover, and turn it into proposals for new themes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_common::keywords::theme_keywords;
use tigerclaw_common::{Label, PersonType, RelType, SignalStrength};

use crate::store::{GraphError, GraphStore};

/// (domain, substrings that vote for it). Matching is substring, so
/// "manufactur" covers manufacturing and manufacturer.
const KEYWORD_TO_DOMAIN: &[(&str, &[&str])] = &[
    ("quantum", &["quantum", "qubit", "entanglement"]),
    ("photonics", &["photon", "optical", "laser", "wavelength"]),
    ("semiconductors", &["semiconductor", "chip", "transistor", "dram"]),
    ("robotics", &["robot", "actuator", "manipulation"]),
    ("biotech", &["biotech", "protein", "genomic", "drug"]),
    ("infra", &["memory", "checkpoint", "tiering", "cache", "runtime"]),
    ("ai", &["agent", "symbolic", "prompt", "inference", "llm", "transformer"]),
    ("security", &["security", "firewall", "encryption"]),
    ("networks", &["network", "routing", "switching"]),
    ("aerospace", &["satellite", "orbit"]),
    ("manufacturing", &["manufactur", "cnc"]),
    ("materials", &["material", "alloy", "composite"]),
    ("iot", &["sensor", "embedded"]),
    ("cleantech", &["energy", "solar", "battery"]),
];

const DEFAULT_DOMAIN: &str = "ai";
const DUPLICATE_OVERLAP: f64 = 0.6;
const MAX_VOCABULARY: usize = 10;
const MAX_TITLE_WORDS: usize = 5;

/// Coarse domain by keyword vote; ties go to the domain listed first.
pub fn infer_domain<S: AsRef<str>>(keywords: &[S]) -> &'static str {
    let mut votes: BTreeMap<&'static str, usize> = BTreeMap::new();
    for kw in keywords {
        let kw = kw.as_ref().to_lowercase();
        for (domain, patterns) in KEYWORD_TO_DOMAIN {
            if patterns.iter().any(|p| kw.contains(p)) {
                *votes.entry(*domain).or_default() += 1;
            }
        }
    }
    let best = votes.values().copied().max().unwrap_or(0);
    if best == 0 {
        return DEFAULT_DOMAIN;
    }
    KEYWORD_TO_DOMAIN
        .iter()
        .map(|(d, _)| *d)
        .find(|d| votes.get(d) == Some(&best))
        .unwrap_or(DEFAULT_DOMAIN)
}

// ---------------------------------------------------------------------------
// Proposals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    OrphanCluster,
    BridgeNode,
    AffiliationAnomaly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalAction {
    CreateTriage,
    LogOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeProposal {
    pub source: ProposalSource,
    pub suggested_title: String,
    pub suggested_domain: String,
    pub primitive: String,
    pub confidence: SignalStrength,
    pub action: ProposalAction,
    /// Defining vocabulary; empty for graph-derived proposals.
    pub keywords: Vec<String>,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    All,
    Orphan,
    Bridge,
    Affiliation,
}

impl Strategy {
    fn includes(&self, other: Strategy) -> bool {
        *self == Strategy::All || *self == other
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::All => "all",
            Strategy::Orphan => "orphan",
            Strategy::Bridge => "bridge",
            Strategy::Affiliation => "affiliation",
        };
        f.write_str(s)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "all" => Ok(Strategy::All),
            "orphan" => Ok(Strategy::Orphan),
            "bridge" => Ok(Strategy::Bridge),
            "affiliation" => Ok(Strategy::Affiliation),
            _ => Err(format!("unknown strategy '{raw}' (all, orphan, bridge, affiliation)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryConfig {
    /// Candidates whose best theme relevance is below this are orphans.
    pub max_relevance: f64,
    /// Orphans must still score at least this on their own.
    pub min_score: i32,
    pub min_cluster: usize,
    /// Institutions need this many distinct people to be considered.
    pub min_people: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_relevance: 0.3,
            min_score: 4,
            min_cluster: 3,
            min_people: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Orphan clustering
// ---------------------------------------------------------------------------

/// A scored scan candidate, as seen by orphan clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryCandidate {
    pub name: String,
    pub score: i32,
    pub best_relevance: f64,
    pub keywords: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanCluster {
    pub members: Vec<String>,
    /// Seed keywords shared by at least half the members.
    pub vocabulary: Vec<String>,
    pub title: String,
    pub domain: String,
}

fn synthesize_title(vocabulary: &[String]) -> String {
    let words: Vec<&str> = vocabulary
        .iter()
        .filter(|k| k.chars().count() > 4)
        .take(MAX_TITLE_WORDS)
        .map(String::as_str)
        .collect();
    if words.is_empty() {
        "Untitled adjacent theme".to_string()
    } else {
        format!("{} — adjacent theme", words.join(" "))
    }
}

/// Greedy single-pass clustering. Each unassigned orphan seeds a cluster
/// and absorbs later orphans sharing at least two keywords with the
/// cluster's growing keyword union.
pub fn cluster_orphans(candidates: &[DiscoveryCandidate], config: &DiscoveryConfig) -> Vec<OrphanCluster> {
    let orphans: Vec<&DiscoveryCandidate> = candidates
        .iter()
        .filter(|c| c.best_relevance < config.max_relevance && c.score >= config.min_score)
        .filter(|c| !c.keywords.is_empty())
        .collect();

    let mut assigned = vec![false; orphans.len()];
    let mut clusters = Vec::new();

    for seed_idx in 0..orphans.len() {
        if assigned[seed_idx] {
            continue;
        }
        assigned[seed_idx] = true;
        let seed = orphans[seed_idx];
        let mut members = vec![seed];
        let mut union = seed.keywords.clone();

        for idx in seed_idx + 1..orphans.len() {
            if assigned[idx] {
                continue;
            }
            let other = orphans[idx];
            if other.keywords.intersection(&union).count() >= 2 {
                assigned[idx] = true;
                union.extend(other.keywords.iter().cloned());
                members.push(other);
            }
        }

        if members.len() < config.min_cluster {
            continue;
        }

        let needed = members.len().div_ceil(2);
        let mut vocabulary: Vec<(usize, &String)> = seed
            .keywords
            .iter()
            .map(|kw| (members.iter().filter(|m| m.keywords.contains(kw)).count(), kw))
            .filter(|(n, _)| *n >= needed)
            .collect();
        vocabulary.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        let vocabulary: Vec<String> = vocabulary
            .into_iter()
            .take(MAX_VOCABULARY)
            .map(|(_, kw)| kw.clone())
            .collect();

        clusters.push(OrphanCluster {
            members: members.iter().map(|m| m.name.clone()).collect(),
            title: synthesize_title(&vocabulary),
            domain: infer_domain(&vocabulary).to_string(),
            vocabulary,
        });
    }
    clusters
}

fn orphan_proposal(cluster: &OrphanCluster) -> ThemeProposal {
    ThemeProposal {
        source: ProposalSource::OrphanCluster,
        suggested_title: format!("[Auto-discovered] {}", cluster.title),
        suggested_domain: cluster.domain.clone(),
        primitive: cluster.vocabulary.join(", "),
        confidence: if cluster.members.len() >= 5 {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        },
        action: ProposalAction::CreateTriage,
        keywords: cluster.vocabulary.clone(),
        evidence: cluster.members.clone(),
    }
}

// ---------------------------------------------------------------------------
// Graph strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeNode {
    pub slug: String,
    pub name: String,
    pub themes: Vec<String>,
    pub candidates: Vec<String>,
}

/// Reference people who co-authored with candidates spanning two or more
/// themes.
pub async fn bridge_nodes(store: &dyn GraphStore) -> Result<Vec<BridgeNode>, GraphError> {
    let people: BTreeMap<String, _> = store
        .nodes(Label::Person)
        .await?
        .into_iter()
        .map(|n| (n.key().to_string(), n))
        .collect();

    let mut expertise: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for edge in store.edges(RelType::HasExpertiseIn).await? {
        if edge.to.label == Label::Theme {
            expertise.entry(edge.from.key).or_default().insert(edge.to.key);
        }
    }

    let mut reach: BTreeMap<String, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();
    for edge in store.edges(RelType::Coauthored).await? {
        let (reference, candidate) = (&edge.from.key, &edge.to.key);
        let is_reference = people
            .get(reference)
            .is_some_and(|p| p.person_type() == Some(PersonType::Reference));
        let Some(themes) = expertise.get(candidate) else {
            continue;
        };
        if !is_reference {
            continue;
        }
        let entry = reach.entry(reference.clone()).or_default();
        entry.0.extend(themes.iter().cloned());
        if let Some(c) = people.get(candidate) {
            entry.1.insert(c.display_name().to_string());
        }
    }

    Ok(reach
        .into_iter()
        .filter(|(_, (themes, _))| themes.len() >= 2)
        .map(|(slug, (themes, candidates))| BridgeNode {
            name: people
                .get(&slug)
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| slug.clone()),
            slug,
            themes: themes.into_iter().collect(),
            candidates: candidates.into_iter().collect(),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffiliationAnomaly {
    pub institution: String,
    pub people: Vec<String>,
    pub themes: Vec<String>,
}

/// Institutions whose people span two or more themes.
///
/// Membership comes from AFFILIATED_WITH edges and from the institution
/// context recorded on WORKED_WITH edges.
pub async fn affiliation_anomalies(store: &dyn GraphStore, min_people: usize) -> Result<Vec<AffiliationAnomaly>, GraphError> {
    let mut members: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for edge in store.edges(RelType::AffiliatedWith).await? {
        if edge.from.label == Label::Person {
            members.entry(edge.to.key).or_default().insert(edge.from.key);
        }
    }
    for edge in store.edges(RelType::WorkedWith).await? {
        if let Some(ctx) = edge.props.str("context") {
            let group = members.entry(ctx.to_string()).or_default();
            group.insert(edge.from.key);
            group.insert(edge.to.key);
        }
    }

    let mut expertise: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for edge in store.edges(RelType::HasExpertiseIn).await? {
        if edge.to.label == Label::Theme {
            expertise.entry(edge.from.key).or_default().insert(edge.to.key);
        }
    }

    Ok(members
        .into_iter()
        .filter(|(_, people)| people.len() >= min_people)
        .filter_map(|(institution, people)| {
            let themes: BTreeSet<String> = people
                .iter()
                .filter_map(|p| expertise.get(p))
                .flatten()
                .cloned()
                .collect();
            (themes.len() >= 2).then(|| AffiliationAnomaly {
                institution,
                people: people.into_iter().collect(),
                themes: themes.into_iter().collect(),
            })
        })
        .collect())
}

fn bridge_proposal(bridge: &BridgeNode) -> ThemeProposal {
    ThemeProposal {
        source: ProposalSource::BridgeNode,
        suggested_title: format!(
            "[Auto-discovered] Bridge: {} connects {}",
            bridge.name,
            bridge.themes.join(" + ")
        ),
        suggested_domain: infer_domain(&bridge.themes).to_string(),
        primitive: format!("Intersection of {}", bridge.themes.join(" and ")),
        confidence: if bridge.themes.len() >= 3 {
            SignalStrength::Strong
        } else {
            SignalStrength::Medium
        },
        action: ProposalAction::CreateTriage,
        keywords: Vec::new(),
        evidence: bridge.candidates.clone(),
    }
}

fn affiliation_proposal(anomaly: &AffiliationAnomaly) -> ThemeProposal {
    ThemeProposal {
        source: ProposalSource::AffiliationAnomaly,
        suggested_title: format!(
            "[Investigate] {} spans {}",
            anomaly.institution,
            anomaly.themes.join(", ")
        ),
        suggested_domain: infer_domain(&anomaly.themes).to_string(),
        primitive: format!("Cross-theme research at {}", anomaly.institution),
        confidence: SignalStrength::Weak,
        action: if anomaly.themes.len() >= 3 {
            ProposalAction::CreateTriage
        } else {
            ProposalAction::LogOnly
        },
        keywords: Vec::new(),
        evidence: anomaly.people.clone(),
    }
}

/// True when at least 60% of the proposal's keywords already appear in one
/// existing theme title. Only keyword-bearing proposals can be duplicates.
pub fn is_duplicate(proposal: &ThemeProposal, existing_titles: &[String]) -> bool {
    if proposal.keywords.is_empty() {
        return false;
    }
    existing_titles.iter().any(|title| {
        let title_words: BTreeSet<String> = theme_keywords(title).into_iter().collect();
        let overlap = proposal
            .keywords
            .iter()
            .filter(|kw| title_words.contains(kw.as_str()))
            .count();
        overlap as f64 / proposal.keywords.len() as f64 >= DUPLICATE_OVERLAP
    })
}

/// Run the selected strategies and merge their proposals. Each strategy
/// fails on its own; proposals duplicating an existing theme are dropped.
pub async fn discover(
    store: Option<&dyn GraphStore>,
    candidates: &[DiscoveryCandidate],
    strategy: Strategy,
    config: &DiscoveryConfig,
    existing_titles: &[String],
) -> Vec<ThemeProposal> {
    let mut proposals = Vec::new();

    if strategy.includes(Strategy::Orphan) {
        let clusters = cluster_orphans(candidates, config);
        info!(clusters = clusters.len(), "Orphan clustering complete");
        proposals.extend(clusters.iter().map(orphan_proposal));
    }

    if let Some(store) = store {
        if strategy.includes(Strategy::Bridge) {
            match bridge_nodes(store).await {
                Ok(bridges) => proposals.extend(bridges.iter().map(bridge_proposal)),
                Err(e) => warn!(error = %e, "Bridge-node analysis failed, continuing"),
            }
        }
        if strategy.includes(Strategy::Affiliation) {
            match affiliation_anomalies(store, config.min_people).await {
                Ok(anomalies) => proposals.extend(anomalies.iter().map(affiliation_proposal)),
                Err(e) => warn!(error = %e, "Affiliation analysis failed, continuing"),
            }
        }
    }

    let before = proposals.len();
    proposals.retain(|p| !is_duplicate(p, existing_titles));
    if proposals.len() < before {
        info!(dropped = before - proposals.len(), "Dropped proposals matching existing themes");
    }
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::props::{NodeRef, Props};
    use crate::store::upsert_mirrored;

    fn candidate(name: &str, score: i32, relevance: f64, kws: &[&str]) -> DiscoveryCandidate {
        DiscoveryCandidate {
            name: name.into(),
            score,
            best_relevance: relevance,
            keywords: kws.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn infer_domain_by_majority_substring_vote() {
        assert_eq!(infer_domain(&["photonic", "laser", "memory"]), "photonics");
        assert_eq!(infer_domain(&["manufacturing", "cnc"]), "manufacturing");
        assert_eq!(infer_domain(&["gardening"]), "ai");
        assert_eq!(infer_domain::<&str>(&[]), "ai");
    }

    #[test]
    fn orphans_sharing_two_keywords_cluster() {
        let candidates = vec![
            candidate("A", 5, 0.1, &["photonic", "interconnect", "datacenter"]),
            candidate("B", 6, 0.0, &["photonic", "interconnect", "silicon"]),
            candidate("C", 4, 0.2, &["silicon", "photonic", "packaging"]),
            candidate("D", 9, 0.9, &["photonic", "interconnect"]),
            candidate("E", 2, 0.0, &["photonic", "interconnect"]),
            candidate("F", 7, 0.0, &["protein", "folding"]),
        ];
        let clusters = cluster_orphans(&candidates, &DiscoveryConfig::default());
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.members, vec!["A", "B", "C"]);
        // photonic: 3/3, interconnect: 2/3 (needs ceil(3/2) = 2)
        assert_eq!(cluster.vocabulary, vec!["photonic", "interconnect"]);
        assert_eq!(cluster.title, "photonic interconnect — adjacent theme");
        assert_eq!(cluster.domain, "photonics");
    }

    #[test]
    fn small_clusters_are_discarded() {
        let candidates = vec![
            candidate("A", 5, 0.1, &["qubit", "control"]),
            candidate("B", 5, 0.1, &["qubit", "control"]),
        ];
        assert!(cluster_orphans(&candidates, &DiscoveryConfig::default()).is_empty());
    }

    #[test]
    fn duplicate_check_uses_keyword_overlap() {
        let proposal = orphan_proposal(&OrphanCluster {
            members: vec!["A".into(), "B".into(), "C".into()],
            vocabulary: vec!["photonic".into(), "interconnect".into(), "silicon".into()],
            title: "photonic interconnect silicon — adjacent theme".into(),
            domain: "photonics".into(),
        });
        assert!(is_duplicate(&proposal, &["Silicon photonic interconnects at scale".into(), "Photonic interconnect".into()]));
        assert!(!is_duplicate(&proposal, &["Photonic sensing".into()]));

        let graph_proposal = ThemeProposal {
            keywords: Vec::new(),
            ..proposal
        };
        assert!(!is_duplicate(&graph_proposal, &["Photonic interconnect".into()]));
    }

    #[tokio::test]
    async fn bridge_reference_spanning_two_themes_is_proposed() {
        let g = MemoryGraph::new();
        let reference = NodeRef::person("ref");
        g.merge_node(&reference, &Props::new().with("type", "reference"), &Props::new().with("name", "Ref Person"))
            .await
            .unwrap();
        for (slug, theme) in [("a", "THE-1"), ("b", "THE-2")] {
            let p = NodeRef::person(slug);
            let t = NodeRef::theme(theme);
            g.upsert_node(&p, &Props::new().with("name", slug).with("type", "scan_candidate")).await.unwrap();
            g.upsert_node(&t, &Props::new()).await.unwrap();
            g.upsert_edge(&p, RelType::HasExpertiseIn, &t, &Props::new()).await.unwrap();
            upsert_mirrored(&g, &reference, RelType::Coauthored, &p, &Props::new()).await.unwrap();
        }

        let bridges = bridge_nodes(&g).await.unwrap();
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].slug, "ref");
        assert_eq!(bridges[0].themes, vec!["THE-1", "THE-2"]);

        let proposals = discover(Some(&g as &dyn GraphStore), &[], Strategy::Bridge, &DiscoveryConfig::default(), &[]).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(
            proposals[0].suggested_title,
            "[Auto-discovered] Bridge: Ref Person connects THE-1 + THE-2"
        );
        assert_eq!(proposals[0].primitive, "Intersection of THE-1 and THE-2");
        assert_eq!(proposals[0].confidence, SignalStrength::Medium);
    }

    #[tokio::test]
    async fn institution_spanning_themes_is_flagged() {
        let g = MemoryGraph::new();
        let mit = NodeRef::institution("MIT");
        g.upsert_node(&mit, &Props::new()).await.unwrap();
        for (slug, theme) in [("a", "THE-1"), ("b", "THE-2"), ("c", "THE-3")] {
            let p = NodeRef::person(slug);
            let t = NodeRef::theme(theme);
            g.upsert_node(&p, &Props::new()).await.unwrap();
            g.upsert_node(&t, &Props::new()).await.unwrap();
            g.upsert_edge(&p, RelType::AffiliatedWith, &mit, &Props::new()).await.unwrap();
            g.upsert_edge(&p, RelType::HasExpertiseIn, &t, &Props::new()).await.unwrap();
        }

        let proposals = discover(Some(&g as &dyn GraphStore), &[], Strategy::Affiliation, &DiscoveryConfig::default(), &[]).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].suggested_title, "[Investigate] MIT spans THE-1, THE-2, THE-3");
        assert_eq!(proposals[0].primitive, "Cross-theme research at MIT");
        assert_eq!(proposals[0].confidence, SignalStrength::Weak);
        assert_eq!(proposals[0].action, ProposalAction::CreateTriage);
    }

    #[tokio::test]
    async fn empty_graph_still_yields_orphan_proposals() {
        let g = MemoryGraph::new();
        let candidates = vec![
            candidate("A", 5, 0.1, &["qubit", "control", "cryogenic"]),
            candidate("B", 5, 0.1, &["qubit", "control"]),
            candidate("C", 5, 0.1, &["qubit", "control"]),
        ];
        let proposals = discover(Some(&g as &dyn GraphStore), &candidates, Strategy::All, &DiscoveryConfig::default(), &[]).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].source, ProposalSource::OrphanCluster);
        assert_eq!(proposals[0].suggested_domain, "quantum");
    }
}
