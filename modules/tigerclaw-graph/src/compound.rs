//! Structural pattern detectors. Each is a read-only pass over the graph,
//! safe to re-run, and selectable by name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_common::{Label, RelType, SignalStrength};

use crate::props::{NodeRecord, NodeRef};
use crate::store::{GraphError, GraphStore};

const TEAM_WINDOW_DAYS: i64 = 30;
const CLUSTER_WINDOW_DAYS: i64 = 14;
const CLUSTER_MIN: usize = 3;
const CLUSTER_STRONG: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    TeamFormation,
    ClusterActivation,
    BridgeDiscovery,
}

impl Detector {
    pub const ALL: [Detector; 3] = [
        Detector::TeamFormation,
        Detector::ClusterActivation,
        Detector::BridgeDiscovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::TeamFormation => "team_formation",
            Detector::ClusterActivation => "cluster_activation",
            Detector::BridgeDiscovery => "bridge_discovery",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Detector {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Detector::ALL
            .into_iter()
            .find(|d| d.as_str() == raw)
            .ok_or_else(|| {
                let known: Vec<_> = Detector::ALL.iter().map(|d| d.as_str()).collect();
                format!("unknown detector '{raw}' (expected one of: {})", known.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundHit {
    pub detector: Detector,
    pub name: String,
    pub detail: String,
    pub strength: SignalStrength,
    pub people: Vec<String>,
    pub themes: Vec<String>,
}

/// Run one detector.
pub async fn detect(store: &dyn GraphStore, detector: Detector, today: NaiveDate) -> Result<Vec<CompoundHit>, GraphError> {
    match detector {
        Detector::TeamFormation => team_formation(store, today).await,
        Detector::ClusterActivation => cluster_activation(store, today).await,
        Detector::BridgeDiscovery => bridge_discovery(store).await,
    }
}

/// Run every detector; a failing detector is logged and skipped.
pub async fn detect_all(store: &dyn GraphStore, today: NaiveDate) -> Vec<CompoundHit> {
    let mut hits = Vec::new();
    for detector in Detector::ALL {
        match detect(store, detector, today).await {
            Ok(found) => {
                info!(detector = %detector, hits = found.len(), "Compound detector complete");
                hits.extend(found);
            }
            Err(e) => warn!(error = %e, detector = %detector, "Compound detector failed, continuing"),
        }
    }
    hits
}

/// Seen in the last `days` days; a future date does not count.
fn seen_within(node: &NodeRecord, today: NaiveDate, days: i64) -> bool {
    node.last_seen()
        .is_some_and(|seen| (0..=days).contains(&(today - seen).num_days()))
}

fn is_active(node: &NodeRecord, today: NaiveDate, days: i64) -> bool {
    node.action().is_some_and(|a| a.is_tracked()) && seen_within(node, today, days)
}

async fn people_by_slug(store: &dyn GraphStore) -> Result<BTreeMap<String, NodeRecord>, GraphError> {
    Ok(store
        .nodes(Label::Person)
        .await?
        .into_iter()
        .map(|n| (n.key().to_string(), n))
        .collect())
}

/// Co-authors or colleagues, both tracked and both seen in the last 30 days.
async fn team_formation(store: &dyn GraphStore, today: NaiveDate) -> Result<Vec<CompoundHit>, GraphError> {
    let people = people_by_slug(store).await?;

    let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();
    for rel in [RelType::Coauthored, RelType::WorkedWith] {
        for edge in store.edges(rel).await? {
            if edge.from.label != Label::Person || edge.to.label != Label::Person {
                continue;
            }
            let (a, b) = if edge.from.key <= edge.to.key {
                (edge.from.key, edge.to.key)
            } else {
                (edge.to.key, edge.from.key)
            };
            if a != b {
                pairs.insert((a, b));
            }
        }
    }

    let mut hits = Vec::new();
    for (a, b) in pairs {
        let (Some(pa), Some(pb)) = (people.get(&a), people.get(&b)) else {
            continue;
        };
        if !is_active(pa, today, TEAM_WINDOW_DAYS) || !is_active(pb, today, TEAM_WINDOW_DAYS) {
            continue;
        }
        let action = |p: &NodeRecord| p.action().map(|a| a.as_str()).unwrap_or("-");
        hits.push(CompoundHit {
            detector: Detector::TeamFormation,
            name: format!("TEAM: {} + {}", pa.display_name(), pb.display_name()),
            detail: format!(
                "Co-authors/colleagues both active — possible team forming ({}, {})",
                action(pa),
                action(pb)
            ),
            strength: SignalStrength::Strong,
            people: vec![a, b],
            themes: Vec::new(),
        });
    }
    Ok(hits)
}

/// Themes with at least three tracked people seen in the last 14 days.
async fn cluster_activation(store: &dyn GraphStore, today: NaiveDate) -> Result<Vec<CompoundHit>, GraphError> {
    let people = people_by_slug(store).await?;

    let mut active: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for edge in store.edges(RelType::HasExpertiseIn).await? {
        if edge.to.label != Label::Theme {
            continue;
        }
        let Some(person) = people.get(&edge.from.key) else {
            continue;
        };
        if is_active(person, today, CLUSTER_WINDOW_DAYS) {
            active.entry(edge.to.key).or_default().insert(edge.from.key);
        }
    }

    let hits = active
        .into_iter()
        .filter(|(_, members)| members.len() >= CLUSTER_MIN)
        .map(|(theme, members)| {
            let names: Vec<&str> = members
                .iter()
                .take(5)
                .filter_map(|slug| people.get(slug).map(|p| p.display_name()))
                .collect();
            CompoundHit {
                detector: Detector::ClusterActivation,
                name: format!("CLUSTER: {theme}"),
                detail: format!(
                    "{} tracked people active in last {}d: {}",
                    members.len(),
                    CLUSTER_WINDOW_DAYS,
                    names.join(", ")
                ),
                strength: if members.len() >= CLUSTER_STRONG {
                    SignalStrength::Strong
                } else {
                    SignalStrength::Medium
                },
                people: members.into_iter().collect(),
                themes: vec![theme],
            }
        })
        .collect();
    Ok(hits)
}

/// Tracked people whose expertise spans themes that are not marked adjacent.
async fn bridge_discovery(store: &dyn GraphStore) -> Result<Vec<CompoundHit>, GraphError> {
    let people = people_by_slug(store).await?;

    let adjacent: BTreeSet<(String, String)> = store
        .edges(RelType::AdjacentTo)
        .await?
        .into_iter()
        .flat_map(|e| [(e.from.key.clone(), e.to.key.clone()), (e.to.key, e.from.key)])
        .collect();

    let mut expertise: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for edge in store.edges(RelType::HasExpertiseIn).await? {
        if edge.from.label == Label::Person && edge.to.label == Label::Theme {
            expertise.entry(edge.from.key).or_default().insert(edge.to.key);
        }
    }

    let mut hits = Vec::new();
    for (slug, themes) in expertise {
        let Some(person) = people.get(&slug).filter(|p| p.action().is_some_and(|a| a.is_tracked())) else {
            continue;
        };
        let themes: Vec<&String> = themes.iter().collect();
        let mut bridged = Vec::new();
        for (i, a) in themes.iter().enumerate() {
            for b in &themes[i + 1..] {
                if !adjacent.contains(&((*a).clone(), (*b).clone())) {
                    bridged.push(((*a).clone(), (*b).clone()));
                }
            }
        }
        if bridged.is_empty() {
            continue;
        }

        let name = person.display_name().to_string();
        let pairs: Vec<String> = bridged.iter().map(|(a, b)| format!("{a} & {b}")).collect();
        let involved: BTreeSet<String> = bridged.iter().flat_map(|(a, b)| [a.clone(), b.clone()]).collect();

        hits.push(CompoundHit {
            detector: Detector::BridgeDiscovery,
            name: format!("BRIDGE: {name}"),
            detail: format!("Connects {} (no adjacency)", pairs.join(", ")),
            strength: if bridged.len() >= 2 {
                SignalStrength::Strong
            } else {
                SignalStrength::Medium
            },
            people: vec![slug],
            themes: involved.into_iter().collect(),
        });
    }
    Ok(hits)
}
