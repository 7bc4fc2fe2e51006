// In-memory GraphStore for tests.
//
// Mirrors the Neo4j backend's semantics: MERGE by key, `SET +=` property
// overlay, edge identity = (from, rel, to), MissingEndpoint instead of stub
// nodes. Edges are directed as stored; `neighbors` reports both directions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use tigerclaw_common::{Label, RelType};

use crate::props::{EdgeRecord, GraphCounts, Neighbor, NodeRecord, NodeRef, Props};
use crate::store::{GraphError, GraphStore};

type EdgeKey = (NodeRef, RelType, NodeRef);

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeRef, Props>,
    edges: BTreeMap<EdgeKey, Props>,
}

#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
    fail_neighbors: Mutex<bool>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `neighbors` call fail, to exercise degraded paths.
    pub fn fail_neighbors(&self) {
        *self.fail_neighbors.lock().unwrap() = true;
    }

    pub fn props(&self, node: &NodeRef) -> Option<Props> {
        self.state.lock().unwrap().nodes.get(node).cloned()
    }

    pub fn has_edge(&self, from: &NodeRef, rel: RelType, to: &NodeRef) -> bool {
        self.state
            .lock()
            .unwrap()
            .edges
            .contains_key(&(from.clone(), rel, to.clone()))
    }

    pub fn edge_props(&self, from: &NodeRef, rel: RelType, to: &NodeRef) -> Option<Props> {
        self.state
            .lock()
            .unwrap()
            .edges
            .get(&(from.clone(), rel, to.clone()))
            .cloned()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.lock().unwrap().edges.len()
    }
}

fn record(node: &NodeRef, props: &Props) -> NodeRecord {
    NodeRecord::new(node.clone(), props.clone())
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn ensure_schema(&self) -> Result<(), GraphError> {
        Ok(())
    }

    async fn merge_node(&self, node: &NodeRef, on_create: &Props, attrs: &Props) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.nodes.entry(node.clone()).or_insert_with(|| {
            let mut props = Props::new().with(node.label.key_field(), node.key.as_str());
            props.merge(on_create);
            props
        });
        entry.merge(attrs);
        Ok(())
    }

    async fn upsert_edge(&self, from: &NodeRef, rel: RelType, to: &NodeRef, props: &Props) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(from) || !state.nodes.contains_key(to) {
            return Err(GraphError::MissingEndpoint {
                from: from.clone(),
                rel,
                to: to.clone(),
            });
        }
        state
            .edges
            .entry((from.clone(), rel, to.clone()))
            .or_default()
            .merge(props);
        Ok(())
    }

    async fn node(&self, node: &NodeRef) -> Result<Option<NodeRecord>, GraphError> {
        let state = self.state.lock().unwrap();
        Ok(state.nodes.get(node).map(|p| record(node, p)))
    }

    async fn neighbors(&self, node: &NodeRef) -> Result<Vec<Neighbor>, GraphError> {
        if *self.fail_neighbors.lock().unwrap() {
            return Err(GraphError::Decode("neighbors unavailable".into()));
        }
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for ((from, rel, to), props) in &state.edges {
            let (other, outgoing) = if from == node {
                (to, true)
            } else if to == node {
                (from, false)
            } else {
                continue;
            };
            if let Some(other_props) = state.nodes.get(other) {
                out.push(Neighbor {
                    rel: *rel,
                    outgoing,
                    node: record(other, other_props),
                    props: props.clone(),
                });
            }
        }
        Ok(out)
    }

    async fn nodes(&self, label: Label) -> Result<Vec<NodeRecord>, GraphError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .iter()
            .filter(|(n, _)| n.label == label)
            .map(|(n, p)| record(n, p))
            .collect())
    }

    async fn edges(&self, rel: RelType) -> Result<Vec<EdgeRecord>, GraphError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .edges
            .iter()
            .filter(|((_, r, _), _)| *r == rel)
            .map(|((from, r, to), props)| EdgeRecord {
                from: from.clone(),
                rel: *r,
                to: to.clone(),
                props: props.clone(),
            })
            .collect())
    }

    async fn counts(&self) -> Result<GraphCounts, GraphError> {
        let state = self.state.lock().unwrap();
        let mut counts = GraphCounts::default();
        for label in Label::ALL {
            let n = state.nodes.keys().filter(|n| n.label == label).count();
            counts.nodes.insert(label, n);
        }
        for (_, rel, _) in state.edges.keys() {
            *counts.edges.entry(*rel).or_default() += 1;
        }
        Ok(counts)
    }
}
