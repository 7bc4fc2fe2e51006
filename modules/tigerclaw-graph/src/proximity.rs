//! Graph proximity bonus: how close a candidate sits to the people the
//! pipeline is already pursuing.

use std::collections::BTreeMap;

use serde::Serialize;

use tigerclaw_common::{excellence_weight, Action};

use crate::neighborhood::{walk, Neighborhood};
use crate::props::{NodeRecord, NodeRef};
use crate::store::{GraphError, GraphStore};

pub const MAX_BONUS: i32 = 3;
const HOP2_DAMPING: f64 = 0.3;
const MAX_MULTI_PATH: usize = 2;
const RAW_PER_POINT: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contributor {
    pub key: String,
    pub name: String,
    pub action: Option<Action>,
    pub paths: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityResult {
    pub bonus: i32,
    pub raw: f64,
    pub paths: usize,
    pub explanation: String,
    pub contributors: Vec<Contributor>,
}

impl ProximityResult {
    fn skipped_funded() -> Self {
        Self {
            bonus: 0,
            raw: 0.0,
            paths: 0,
            explanation: "Skipped: already funded".to_string(),
            contributors: Vec::new(),
        }
    }
}

/// Proximity bonus for `subject`. Already-funded candidates short-circuit to
/// zero without touching the graph.
pub async fn proximity_bonus(
    store: &dyn GraphStore,
    subject: &NodeRef,
    already_funded: bool,
) -> Result<ProximityResult, GraphError> {
    if already_funded {
        return Ok(ProximityResult::skipped_funded());
    }
    let neighborhood = walk(store, subject).await?;
    Ok(score_proximity(&neighborhood))
}

struct Tally<'a> {
    node: &'a NodeRecord,
    paths: usize,
    sum: f64,
}

/// Count a path toward `node`; non-anchors (zero contribution) are ignored.
fn tally<'a>(tallies: &mut BTreeMap<&'a NodeRef, Tally<'a>>, node: &'a NodeRecord, contribution: f64) {
    if contribution <= 0.0 {
        return;
    }
    let t = tallies.entry(&node.node).or_insert(Tally { node, paths: 0, sum: 0.0 });
    t.paths += 1;
    t.sum += contribution;
}

/// Score an already-walked neighborhood.
pub fn score_proximity(n: &Neighborhood) -> ProximityResult {
    let mut tallies: BTreeMap<&NodeRef, Tally> = BTreeMap::new();

    for h in &n.hop1 {
        tally(&mut tallies, &h.node, h.rel.weight() * excellence_weight(h.node.action()));
    }
    for h in &n.hop2 {
        let tie = h.rel1.weight().min(h.rel2.weight());
        tally(&mut tallies, &h.node, tie * HOP2_DAMPING * excellence_weight(h.node.action()));
    }

    let mut contributors: Vec<Contributor> = tallies
        .into_values()
        .map(|t| {
            let multi_path = t.paths.saturating_sub(1).min(MAX_MULTI_PATH) as f64;
            Contributor {
                key: t.node.key().to_string(),
                name: t.node.display_name().to_string(),
                action: t.node.action(),
                paths: t.paths,
                score: t.sum + multi_path,
            }
        })
        .collect();
    contributors.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.key.cmp(&b.key)));

    let raw: f64 = contributors.iter().map(|c| c.score).sum();
    let paths = contributors.iter().map(|c| c.paths).sum();
    let bonus = ((raw / RAW_PER_POINT).floor() as i32).clamp(0, MAX_BONUS);

    let explanation = if contributors.is_empty() {
        "No connections to excellence nodes".to_string()
    } else {
        let parts: Vec<String> = contributors
            .iter()
            .map(|c| {
                let action = c.action.map(|a| a.as_str()).unwrap_or("-");
                format!("{} [{}] via {} path(s) = {:.1}", c.name, action, c.paths, c.score)
            })
            .collect();
        format!("+{bonus} graph bonus (raw {raw:.1}): {}", parts.join("; "))
    };

    ProximityResult {
        bonus,
        raw,
        paths,
        explanation,
        contributors,
    }
}
