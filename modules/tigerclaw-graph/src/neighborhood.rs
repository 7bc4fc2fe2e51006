//! Bounded two-hop neighborhood shared by proximity scoring and ripple
//! propagation.
//!
//! A relationship fact counts once however it is stored: the mirrored pair
//! `a-[:COAUTHORED]->b`, `b-[:COAUTHORED]->a` is one path. Distinct
//! relationship types to the same neighbor are distinct paths. Audit edges
//! are never walked.

use std::collections::{BTreeMap, BTreeSet};

use tigerclaw_common::RelType;

use crate::props::{Neighbor, NodeRecord, NodeRef};
use crate::store::{GraphError, GraphStore};

#[derive(Debug, Clone)]
pub struct Hop1 {
    pub rel: RelType,
    pub node: NodeRecord,
}

#[derive(Debug, Clone)]
pub struct Hop2 {
    pub rel1: RelType,
    pub via: NodeRecord,
    pub rel2: RelType,
    pub node: NodeRecord,
}

#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub subject: NodeRef,
    pub hop1: Vec<Hop1>,
    pub hop2: Vec<Hop2>,
}

/// Collapse raw neighbor rows into distinct `(rel, node)` facts, dropping
/// audit edges and self-loops.
fn distinct_facts(origin: &NodeRef, rows: Vec<Neighbor>) -> Vec<(RelType, NodeRecord)> {
    let mut seen: BTreeMap<(RelType, NodeRef), NodeRecord> = BTreeMap::new();
    for row in rows {
        if row.rel.is_audit() || &row.node.node == origin {
            continue;
        }
        seen.entry((row.rel, row.node.node.clone())).or_insert(row.node);
    }
    seen.into_iter().map(|((rel, _), node)| (rel, node)).collect()
}

/// Walk one and two hops out from `subject`.
///
/// Hop-2 paths exclude the subject itself, anything already reached at hop
/// 1, and the intermediate node.
pub async fn walk(store: &dyn GraphStore, subject: &NodeRef) -> Result<Neighborhood, GraphError> {
    let hop1: Vec<Hop1> = distinct_facts(subject, store.neighbors(subject).await?)
        .into_iter()
        .map(|(rel, node)| Hop1 { rel, node })
        .collect();

    let reached: BTreeSet<NodeRef> = hop1.iter().map(|h| h.node.node.clone()).collect();

    let mut hop2 = Vec::new();
    for mid in &reached {
        let onward = distinct_facts(mid, store.neighbors(mid).await?);
        for first in hop1.iter().filter(|h| &h.node.node == mid) {
            for (rel2, target) in &onward {
                if &target.node == subject || reached.contains(&target.node) {
                    continue;
                }
                hop2.push(Hop2 {
                    rel1: first.rel,
                    via: first.node.clone(),
                    rel2: *rel2,
                    node: target.clone(),
                });
            }
        }
    }

    Ok(Neighborhood {
        subject: subject.clone(),
        hop1,
        hop2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::props::Props;
    use crate::store::upsert_mirrored;

    async fn person(g: &MemoryGraph, slug: &str) -> NodeRef {
        let node = NodeRef::person(slug);
        g.upsert_node(&node, &Props::new().with("name", slug)).await.unwrap();
        node
    }

    #[tokio::test]
    async fn mirrored_pair_is_one_path() {
        let g = MemoryGraph::new();
        let a = person(&g, "a").await;
        let b = person(&g, "b").await;
        upsert_mirrored(&g, &a, RelType::Coauthored, &b, &Props::new()).await.unwrap();

        let n = walk(&g, &a).await.unwrap();
        assert_eq!(n.hop1.len(), 1);
        assert_eq!(n.hop1[0].node.key(), "b");
        assert!(n.hop2.is_empty());
    }

    #[tokio::test]
    async fn hop2_excludes_subject_and_hop1_nodes() {
        let g = MemoryGraph::new();
        let a = person(&g, "a").await;
        let b = person(&g, "b").await;
        let c = person(&g, "c").await;
        let d = person(&g, "d").await;
        // a-b, a-c, b-c, b-d: c is hop 1 already, d is the only hop-2 target.
        g.upsert_edge(&a, RelType::Coauthored, &b, &Props::new()).await.unwrap();
        g.upsert_edge(&a, RelType::WorkedWith, &c, &Props::new()).await.unwrap();
        g.upsert_edge(&b, RelType::WorkedWith, &c, &Props::new()).await.unwrap();
        g.upsert_edge(&b, RelType::Founded, &d, &Props::new()).await.unwrap();

        let n = walk(&g, &a).await.unwrap();
        assert_eq!(n.hop1.len(), 2);
        assert_eq!(n.hop2.len(), 1);
        let path = &n.hop2[0];
        assert_eq!(path.via.key(), "b");
        assert_eq!(path.node.key(), "d");
        assert_eq!(path.rel1, RelType::Coauthored);
        assert_eq!(path.rel2, RelType::Founded);
    }

    #[tokio::test]
    async fn audit_edges_are_not_walked() {
        let g = MemoryGraph::new();
        let a = person(&g, "a").await;
        let b = person(&g, "b").await;
        g.upsert_edge(&a, RelType::RippleScored, &b, &Props::new()).await.unwrap();

        let n = walk(&g, &a).await.unwrap();
        assert!(n.hop1.is_empty());
    }

    #[tokio::test]
    async fn two_relationship_types_are_two_paths() {
        let g = MemoryGraph::new();
        let a = person(&g, "a").await;
        let b = person(&g, "b").await;
        g.upsert_edge(&a, RelType::Coauthored, &b, &Props::new()).await.unwrap();
        g.upsert_edge(&b, RelType::WorkedWith, &a, &Props::new()).await.unwrap();

        let n = walk(&g, &a).await.unwrap();
        assert_eq!(n.hop1.len(), 2);
    }
}
