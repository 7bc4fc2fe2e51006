//! Ripple propagation: push the implied score of a trigger event outward
//! through the trigger's neighborhood.
//!
//! Propagation only reports. It never changes a neighbor's action; the
//! optional audit edges record that a ripple happened.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_common::{Action, Label, RelType, SignalStrength};

use crate::neighborhood::{walk, Neighborhood};
use crate::props::{NodeRecord, NodeRef, Props};
use crate::store::{find_entity, GraphError, GraphStore};

const HOP2_DAMPING: f64 = 0.5;
const MULTI_PATH_BONUS: f64 = 2.0;

pub const ESCALATE_MIN: f64 = 6.0;
pub const REVIEW_MIN: f64 = 3.0;

pub fn strength_multiplier(strength: SignalStrength) -> f64 {
    match strength {
        SignalStrength::Strong => 1.5,
        SignalStrength::Medium => 1.0,
        SignalStrength::Weak => 0.7,
    }
}

/// Human label for an event type; unknown types pass through.
pub fn event_label(event: &str) -> &str {
    match event {
        "phd_defense" => "PhD defense",
        "departure" => "left company/lab",
        "new_repo" => "new GitHub repo",
        "funding" => "raised funding",
        "conference" => "conference talk",
        "paper" => "new paper published",
        "launch" => "product launch",
        "hiring" => "hiring signal",
        "pivot" => "company pivot",
        "exit" => "exit/acquisition",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Escalate,
    Review,
    Note,
}

impl Verdict {
    /// Band a final score; `None` means the neighbor is dropped.
    pub fn from_score(score: f64) -> Option<Self> {
        if score >= ESCALATE_MIN {
            Some(Verdict::Escalate)
        } else if score >= REVIEW_MIN {
            Some(Verdict::Review)
        } else if score > 0.0 {
            Some(Verdict::Note)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Escalate => "ESCALATE",
            Verdict::Review => "REVIEW",
            Verdict::Note => "NOTE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RippleTarget {
    pub label: Label,
    pub key: String,
    pub name: String,
    pub current_action: Option<Action>,
    pub raw: f64,
    pub paths: usize,
    pub score: f64,
    pub verdict: Verdict,
    /// `REL` for direct ties, `REL1 → via → REL2` for two-hop paths.
    pub path_detail: Vec<String>,
}

impl RippleTarget {
    pub fn node(&self) -> NodeRef {
        NodeRef::new(self.label, self.key.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RippleReport {
    pub trigger: String,
    pub trigger_label: Label,
    pub trigger_name: String,
    pub event: String,
    pub event_label: String,
    pub strength: SignalStrength,
    pub multiplier: f64,
    pub results: Vec<RippleTarget>,
}

impl RippleReport {
    pub fn with_verdict(&self, verdict: Verdict) -> impl Iterator<Item = &RippleTarget> {
        self.results.iter().filter(move |t| t.verdict == verdict)
    }

    pub fn trigger_node(&self) -> NodeRef {
        NodeRef::new(self.trigger_label, self.trigger.clone())
    }
}

impl fmt::Display for RippleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ripple: {} ({}) ===", self.trigger_name, self.event_label)?;
        writeln!(f, "Event strength: {} (x{})", self.strength, self.multiplier)?;
        if self.results.is_empty() {
            writeln!(f, "No connected entities scored above zero.")?;
            return Ok(());
        }
        for verdict in [Verdict::Escalate, Verdict::Review, Verdict::Note] {
            let group: Vec<_> = self.with_verdict(verdict).collect();
            if group.is_empty() {
                continue;
            }
            writeln!(f, "\n{} ({})", verdict.as_str(), group.len())?;
            for t in group {
                let action = t.current_action.map(|a| a.as_str()).unwrap_or("-");
                writeln!(f, "  {:<28} {:>5.1}  [{}]  {}", t.name, t.score, action, t.path_detail.join(", "))?;
            }
        }
        Ok(())
    }
}

struct Tally<'a> {
    node: &'a NodeRecord,
    raw: f64,
    paths: usize,
    detail: Vec<String>,
}

fn tally<'a>(tallies: &mut BTreeMap<&'a NodeRef, Tally<'a>>, node: &'a NodeRecord, weight: f64, detail: String) {
    let t = tallies.entry(&node.node).or_insert(Tally {
        node,
        raw: 0.0,
        paths: 0,
        detail: Vec::new(),
    });
    t.raw += weight;
    t.paths += 1;
    t.detail.push(detail);
}

/// Score every Person/Company in an already-walked neighborhood. Other
/// labels only carry paths. Sorted by score, highest first.
pub fn score_ripple(n: &Neighborhood, multiplier: f64) -> Vec<RippleTarget> {
    let mut tallies: BTreeMap<&NodeRef, Tally> = BTreeMap::new();

    for h in n.hop1.iter().filter(|h| h.node.is_entity()) {
        tally(&mut tallies, &h.node, h.rel.weight(), h.rel.to_string());
    }
    for h in n.hop2.iter().filter(|h| h.node.is_entity()) {
        let weight = h.rel1.weight().min(h.rel2.weight()) * HOP2_DAMPING;
        let detail = format!("{} → {} → {}", h.rel1, h.via.display_name(), h.rel2);
        tally(&mut tallies, &h.node, weight, detail);
    }

    let mut results: Vec<RippleTarget> = tallies
        .into_values()
        .filter_map(|t| {
            let raw = t.raw + t.paths.saturating_sub(1) as f64 * MULTI_PATH_BONUS;
            let score = (raw * multiplier * 10.0).round() / 10.0;
            let verdict = Verdict::from_score(score)?;
            Some(RippleTarget {
                label: t.node.label(),
                key: t.node.key().to_string(),
                name: t.node.display_name().to_string(),
                current_action: t.node.action(),
                raw,
                paths: t.paths,
                score,
                verdict,
                path_detail: t.detail,
            })
        })
        .collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    results
}

/// Propagate an event from `trigger` (a Person or Company slug).
pub async fn ripple(
    store: &dyn GraphStore,
    trigger: &str,
    event: &str,
    strength: SignalStrength,
) -> Result<RippleReport, GraphError> {
    let subject = find_entity(store, trigger).await?;
    let multiplier = strength_multiplier(strength);
    let neighborhood = walk(store, &subject.node).await?;
    let results = score_ripple(&neighborhood, multiplier);

    info!(
        trigger,
        event,
        hop1 = neighborhood.hop1.len(),
        hop2 = neighborhood.hop2.len(),
        scored = results.len(),
        "Ripple computed"
    );

    Ok(RippleReport {
        trigger: subject.key().to_string(),
        trigger_label: subject.label(),
        trigger_name: subject.display_name().to_string(),
        event: event.to_string(),
        event_label: event_label(event).to_string(),
        strength,
        multiplier,
        results,
    })
}

/// Write RIPPLE_SCORED audit edges from the trigger to each escalated
/// Person. Returns how many were written; a failed write is logged and
/// skipped.
pub async fn record_audit(store: &dyn GraphStore, report: &RippleReport) -> usize {
    let trigger = report.trigger_node();
    let timestamp = Utc::now().to_rfc3339();
    let mut written = 0;

    for target in report
        .with_verdict(Verdict::Escalate)
        .filter(|t| t.label == Label::Person)
    {
        let props = Props::new()
            .with("event", report.event.as_str())
            .with("score", target.score)
            .with("verdict", target.verdict.as_str())
            .with("timestamp", timestamp.as_str());
        match store
            .upsert_edge(&trigger, RelType::RippleScored, &target.node(), &props)
            .await
        {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, target = %target.key, "Failed to record ripple audit edge"),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::store::upsert_mirrored;

    async fn person(g: &MemoryGraph, slug: &str, action: Option<&str>) -> NodeRef {
        let node = NodeRef::person(slug);
        g.upsert_node(&node, &Props::new().with("name", slug).with_opt("action", action))
            .await
            .unwrap();
        node
    }

    #[test]
    fn verdict_boundaries_are_exact() {
        assert_eq!(Verdict::from_score(6.0), Some(Verdict::Escalate));
        assert_eq!(Verdict::from_score(5.0), Some(Verdict::Review));
        assert_eq!(Verdict::from_score(3.0), Some(Verdict::Review));
        assert_eq!(Verdict::from_score(2.0), Some(Verdict::Note));
        assert_eq!(Verdict::from_score(0.0), None);
        assert_eq!(Verdict::from_score(-1.0), None);
    }

    #[test]
    fn unknown_events_pass_through() {
        assert_eq!(event_label("phd_defense"), "PhD defense");
        assert_eq!(event_label("grant"), "grant");
    }

    #[tokio::test]
    async fn strong_event_through_one_coauthor_edge_escalates() {
        let g = MemoryGraph::new();
        let trigger = person(&g, "jane-doe", None).await;
        let coauthor = person(&g, "wei-liu", Some("WATCH")).await;
        upsert_mirrored(&g, &trigger, RelType::Coauthored, &coauthor, &Props::new())
            .await
            .unwrap();

        let report = ripple(&g, "jane-doe", "phd_defense", SignalStrength::Strong).await.unwrap();
        assert_eq!(report.results.len(), 1);
        let target = &report.results[0];
        assert_eq!(target.key, "wei-liu");
        assert_eq!(target.raw, 4.0);
        assert_eq!(target.score, 6.0);
        assert_eq!(target.verdict, Verdict::Escalate);
        assert_eq!(target.current_action, Some(Action::Watch));
        assert_eq!(target.path_detail, vec!["COAUTHORED".to_string()]);
    }

    #[tokio::test]
    async fn theme_nodes_carry_paths_but_are_not_scored() {
        let g = MemoryGraph::new();
        let trigger = person(&g, "trigger", None).await;
        let peer = person(&g, "peer", None).await;
        let theme = NodeRef::theme("THE-1");
        g.upsert_node(&theme, &Props::new().with("title", "Photonics")).await.unwrap();
        g.upsert_edge(&trigger, RelType::HasExpertiseIn, &theme, &Props::new()).await.unwrap();
        g.upsert_edge(&peer, RelType::HasExpertiseIn, &theme, &Props::new()).await.unwrap();

        let report = ripple(&g, "trigger", "paper", SignalStrength::Medium).await.unwrap();
        assert_eq!(report.results.len(), 1);
        let target = &report.results[0];
        assert_eq!(target.key, "peer");
        // min(2, 2) x 0.5 = 1.0 -> NOTE
        assert_eq!(target.score, 1.0);
        assert_eq!(target.verdict, Verdict::Note);
        assert_eq!(
            target.path_detail,
            vec!["HAS_EXPERTISE_IN → Photonics → HAS_EXPERTISE_IN".to_string()]
        );
    }

    #[tokio::test]
    async fn multi_path_bonus_and_weak_multiplier() {
        let g = MemoryGraph::new();
        let trigger = person(&g, "trigger", None).await;
        let peer = person(&g, "peer", None).await;
        upsert_mirrored(&g, &trigger, RelType::Coauthored, &peer, &Props::new()).await.unwrap();
        g.upsert_edge(&trigger, RelType::WorkedWith, &peer, &Props::new()).await.unwrap();

        let report = ripple(&g, "trigger", "departure", SignalStrength::Weak).await.unwrap();
        let target = &report.results[0];
        // (4 + 3 + 1 x 2) x 0.7 = 6.3
        assert_eq!(target.raw, 9.0);
        assert_eq!(target.score, 6.3);
        assert_eq!(target.verdict, Verdict::Escalate);
    }

    #[tokio::test]
    async fn company_trigger_is_found_after_person_lookup() {
        let g = MemoryGraph::new();
        let company = NodeRef::company("acme");
        g.upsert_node(&company, &Props::new().with("name", "Acme")).await.unwrap();
        let founder = person(&g, "founder", None).await;
        g.upsert_edge(&founder, RelType::Founded, &company, &Props::new()).await.unwrap();

        let report = ripple(&g, "acme", "funding", SignalStrength::Medium).await.unwrap();
        assert_eq!(report.trigger_label, Label::Company);
        assert_eq!(report.results[0].score, 3.0);
        assert_eq!(report.results[0].verdict, Verdict::Review);
    }

    #[tokio::test]
    async fn unknown_trigger_is_an_error() {
        let g = MemoryGraph::new();
        let err = ripple(&g, "nobody", "paper", SignalStrength::Strong).await.unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode(slug) if slug == "nobody"));
    }

    #[tokio::test]
    async fn audit_edges_only_for_escalated_people_and_are_not_rewalked() {
        let g = MemoryGraph::new();
        let trigger = person(&g, "trigger", None).await;
        let hot = person(&g, "hot", None).await;
        let warm = person(&g, "warm", None).await;
        upsert_mirrored(&g, &trigger, RelType::Coauthored, &hot, &Props::new()).await.unwrap();
        g.upsert_edge(&trigger, RelType::AdvisedBy, &warm, &Props::new()).await.unwrap();

        let report = ripple(&g, "trigger", "paper", SignalStrength::Strong).await.unwrap();
        assert_eq!(record_audit(&g, &report).await, 1);
        assert!(g.has_edge(&trigger, RelType::RippleScored, &hot));
        assert!(!g.has_edge(&trigger, RelType::RippleScored, &warm));
        assert_eq!(g.props(&hot).unwrap().str("action"), None);

        let again = ripple(&g, "trigger", "paper", SignalStrength::Strong).await.unwrap();
        assert_eq!(again.results, report.results);
    }
}
