//! Canned traversals for operator tooling. Results serialize straight to JSON.

use serde::Serialize;

use tigerclaw_common::{Action, Label, RelType};

use crate::props::{GraphCounts, NodeRecord, NodeRef};
use crate::store::{find_entity, GraphError, GraphStore};

#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub rel: RelType,
    pub direction: &'static str,
    pub label: Label,
    pub key: String,
    pub name: String,
    pub action: Option<Action>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityNeighborhood {
    pub entity: NodeRecord,
    pub connections: Vec<Connection>,
}

/// A person or company with everything directly connected to it.
pub async fn entity_neighborhood(store: &dyn GraphStore, slug: &str) -> Result<EntityNeighborhood, GraphError> {
    let entity = find_entity(store, slug).await?;
    let mut connections: Vec<Connection> = store
        .neighbors(&entity.node)
        .await?
        .into_iter()
        .map(|n| Connection {
            rel: n.rel,
            direction: if n.outgoing { "out" } else { "in" },
            label: n.node.label(),
            key: n.node.key().to_string(),
            name: n.node.display_name().to_string(),
            action: n.node.action(),
        })
        .collect();
    connections.sort_by(|a, b| (a.rel, &a.key, a.direction).cmp(&(b.rel, &b.key, b.direction)));
    Ok(EntityNeighborhood { entity, connections })
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub label: Label,
    pub key: String,
    pub name: String,
    pub action: Option<Action>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeRoster {
    pub theme: NodeRecord,
    pub people: Vec<RosterEntry>,
    pub companies: Vec<RosterEntry>,
}

fn by_confidence(entries: &mut [RosterEntry]) {
    entries.sort_by(|a, b| {
        b.confidence
            .unwrap_or(0.0)
            .total_cmp(&a.confidence.unwrap_or(0.0))
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// People with expertise in a theme and companies related to it, most
/// confident first.
pub async fn theme_roster(store: &dyn GraphStore, key: &str) -> Result<ThemeRoster, GraphError> {
    let node = NodeRef::theme(key);
    let theme = store
        .node(&node)
        .await?
        .ok_or_else(|| GraphError::UnknownNode(node.to_string()))?;

    let mut people = Vec::new();
    let mut companies = Vec::new();
    for n in store.neighbors(&node).await? {
        let entry = RosterEntry {
            label: n.node.label(),
            key: n.node.key().to_string(),
            name: n.node.display_name().to_string(),
            action: n.node.action(),
            confidence: n.props.f64("confidence"),
        };
        match (n.rel, n.node.label()) {
            (RelType::HasExpertiseIn, Label::Person) => people.push(entry),
            (RelType::RelatedToTheme, Label::Company) => companies.push(entry),
            _ => {}
        }
    }
    by_confidence(&mut people);
    by_confidence(&mut companies);
    Ok(ThemeRoster { theme, people, companies })
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjacentExpert {
    pub theme: String,
    pub slug: String,
    pub name: String,
    pub action: Option<Action>,
    pub confidence: Option<f64>,
}

/// Experts in the themes adjacent to `key`, which are people a theme's
/// roster could borrow from.
pub async fn adjacent_theme_experts(store: &dyn GraphStore, key: &str) -> Result<Vec<AdjacentExpert>, GraphError> {
    let node = NodeRef::theme(key);
    if store.node(&node).await?.is_none() {
        return Err(GraphError::UnknownNode(node.to_string()));
    }

    let mut adjacent: Vec<NodeRef> = store
        .neighbors(&node)
        .await?
        .into_iter()
        .filter(|n| n.rel == RelType::AdjacentTo && n.node.label() == Label::Theme)
        .map(|n| n.node.node)
        .collect();
    adjacent.sort();
    adjacent.dedup();

    let mut experts = Vec::new();
    for theme in adjacent {
        for n in store.neighbors(&theme).await? {
            if n.rel != RelType::HasExpertiseIn || n.node.label() != Label::Person {
                continue;
            }
            experts.push(AdjacentExpert {
                theme: theme.key.clone(),
                slug: n.node.key().to_string(),
                name: n.node.display_name().to_string(),
                action: n.node.action(),
                confidence: n.props.f64("confidence"),
            });
        }
    }
    experts.sort_by(|a, b| {
        b.confidence
            .unwrap_or(0.0)
            .total_cmp(&a.confidence.unwrap_or(0.0))
            .then_with(|| a.slug.cmp(&b.slug))
    });
    Ok(experts)
}

pub async fn stats(store: &dyn GraphStore) -> Result<GraphCounts, GraphError> {
    store.counts().await
}
