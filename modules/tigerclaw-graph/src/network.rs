//! Graph-derived rubric flags. Each rule runs its own lookups and fails on
//! its own; a failing rule is logged and contributes nothing.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use tigerclaw_common::{Action, Band, Label, RelType};

use crate::props::NodeRef;
use crate::store::{GraphError, GraphStore};

const RECENT_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRule {
    CoauthorsInPipeline,
    ConnectedToReachOut,
    BridgesThemes,
    SharedAffiliation,
    NetworkRecentlyActive,
    Isolated,
}

impl NetworkRule {
    pub const ALL: [NetworkRule; 6] = [
        NetworkRule::CoauthorsInPipeline,
        NetworkRule::ConnectedToReachOut,
        NetworkRule::BridgesThemes,
        NetworkRule::SharedAffiliation,
        NetworkRule::NetworkRecentlyActive,
        NetworkRule::Isolated,
    ];

    pub fn points(&self) -> i32 {
        match self {
            NetworkRule::CoauthorsInPipeline => 2,
            NetworkRule::ConnectedToReachOut => 2,
            NetworkRule::BridgesThemes => 2,
            NetworkRule::SharedAffiliation => 1,
            NetworkRule::NetworkRecentlyActive => 1,
            NetworkRule::Isolated => -1,
        }
    }

    async fn fires(&self, store: &dyn GraphStore, subject: &NodeRef, today: NaiveDate) -> Result<bool, GraphError> {
        let neighbors: Vec<_> = store
            .neighbors(subject)
            .await?
            .into_iter()
            .filter(|n| !n.rel.is_audit())
            .collect();
        let people = || neighbors.iter().filter(|n| n.node.label() == Label::Person);

        Ok(match self {
            NetworkRule::CoauthorsInPipeline => people()
                .any(|n| n.rel == RelType::Coauthored && n.node.action().is_some()),
            NetworkRule::ConnectedToReachOut => people().any(|n| n.node.action() == Some(Action::ReachOut)),
            NetworkRule::BridgesThemes => {
                let themes: BTreeSet<&str> = neighbors
                    .iter()
                    .filter(|n| n.rel == RelType::HasExpertiseIn)
                    .map(|n| n.node.key())
                    .collect();
                themes.len() >= 2
            }
            NetworkRule::SharedAffiliation => {
                let tracked = |a: Option<Action>| a.is_some_and(|a| a.is_tracked());
                if people().any(|n| n.rel == RelType::WorkedWith && tracked(n.node.action())) {
                    true
                } else {
                    let mut found = false;
                    for inst in neighbors.iter().filter(|n| n.rel == RelType::AffiliatedWith) {
                        let members = store.neighbors(&inst.node.node).await?;
                        if members.iter().any(|m| {
                            m.rel == RelType::AffiliatedWith
                                && &m.node.node != subject
                                && tracked(m.node.action())
                        }) {
                            found = true;
                            break;
                        }
                    }
                    found
                }
            }
            NetworkRule::NetworkRecentlyActive => people().any(|n| {
                n.node
                    .last_seen()
                    .is_some_and(|seen| (today - seen).num_days() < RECENT_DAYS)
            }),
            NetworkRule::Isolated => neighbors.iter().all(|n| n.node.label() == Label::Theme),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub rule: NetworkRule,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkScore {
    pub score: i32,
    pub band: Band,
    pub hits: Vec<RuleHit>,
}

/// Evaluate every network rule for `subject`.
pub async fn network_rubric(store: &dyn GraphStore, subject: &NodeRef, today: NaiveDate) -> NetworkScore {
    let mut hits = Vec::new();
    for rule in NetworkRule::ALL {
        match rule.fires(store, subject, today).await {
            Ok(true) => hits.push(RuleHit {
                rule,
                points: rule.points(),
            }),
            Ok(false) => {}
            Err(e) => warn!(error = %e, rule = ?rule, subject = %subject, "Network rule failed, skipping"),
        }
    }
    let score = hits.iter().map(|h| h.points).sum();
    NetworkScore {
        score,
        band: Band::from_score(score),
        hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::props::Props;
    use crate::store::upsert_mirrored;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn fired(score: &NetworkScore) -> Vec<NetworkRule> {
        score.hits.iter().map(|h| h.rule).collect()
    }

    #[tokio::test]
    async fn connected_recent_bridge_scores_every_positive_rule() {
        let g = MemoryGraph::new();
        let subject = NodeRef::person("subject");
        let star = NodeRef::person("star");
        let colleague = NodeRef::person("colleague");
        let mit = NodeRef::institution("MIT");
        let t1 = NodeRef::theme("THE-1");
        let t2 = NodeRef::theme("THE-2");
        g.upsert_node(&subject, &Props::new()).await.unwrap();
        g.upsert_node(&star, &Props::new().with("action", "REACH_OUT").with("last_seen", "2026-02-25"))
            .await
            .unwrap();
        g.upsert_node(&colleague, &Props::new().with("action", "WATCH")).await.unwrap();
        for n in [&mit, &t1, &t2] {
            g.upsert_node(n, &Props::new()).await.unwrap();
        }
        upsert_mirrored(&g, &subject, RelType::Coauthored, &star, &Props::new()).await.unwrap();
        g.upsert_edge(&subject, RelType::AffiliatedWith, &mit, &Props::new()).await.unwrap();
        g.upsert_edge(&colleague, RelType::AffiliatedWith, &mit, &Props::new()).await.unwrap();
        g.upsert_edge(&subject, RelType::HasExpertiseIn, &t1, &Props::new()).await.unwrap();
        g.upsert_edge(&subject, RelType::HasExpertiseIn, &t2, &Props::new()).await.unwrap();

        let score = network_rubric(&g, &subject, today()).await;
        assert_eq!(
            fired(&score),
            vec![
                NetworkRule::CoauthorsInPipeline,
                NetworkRule::ConnectedToReachOut,
                NetworkRule::BridgesThemes,
                NetworkRule::SharedAffiliation,
                NetworkRule::NetworkRecentlyActive,
            ]
        );
        assert_eq!(score.score, 8);
        assert_eq!(score.band, Band::Strong);
    }

    #[tokio::test]
    async fn theme_only_connections_are_isolated() {
        let g = MemoryGraph::new();
        let subject = NodeRef::person("subject");
        let t1 = NodeRef::theme("THE-1");
        g.upsert_node(&subject, &Props::new()).await.unwrap();
        g.upsert_node(&t1, &Props::new()).await.unwrap();
        g.upsert_edge(&subject, RelType::HasExpertiseIn, &t1, &Props::new()).await.unwrap();

        let score = network_rubric(&g, &subject, today()).await;
        assert_eq!(fired(&score), vec![NetworkRule::Isolated]);
        assert_eq!(score.score, -1);
        assert_eq!(score.band, Band::Pass);
    }

    #[tokio::test]
    async fn failing_lookups_are_skipped() {
        let g = MemoryGraph::new();
        let subject = NodeRef::person("subject");
        g.upsert_node(&subject, &Props::new()).await.unwrap();
        g.fail_neighbors();

        let score = network_rubric(&g, &subject, today()).await;
        assert!(score.hits.is_empty());
        assert_eq!(score.score, 0);
    }
}
