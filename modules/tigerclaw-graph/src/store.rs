use async_trait::async_trait;
use thiserror::Error;

use tigerclaw_common::{Label, RelType};

use crate::props::{EdgeRecord, GraphCounts, Neighbor, NodeRecord, NodeRef, Props};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Cannot create {rel} edge: endpoint missing ({from} -> {to})")]
    MissingEndpoint { from: NodeRef, rel: RelType, to: NodeRef },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Graph persistence seam. Every algorithm in this crate runs against this
/// trait so the Neo4j backend and the in-memory backend behave identically.
///
/// Both upserts are idempotent: identity is the node key, or the
/// `(from, rel, to)` triple for edges. Repeating a call only refreshes
/// properties.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create uniqueness constraints for every label key. Idempotent.
    async fn ensure_schema(&self) -> Result<(), GraphError>;

    /// Merge a node by key. `on_create` is written only when the node is new;
    /// `attrs` is written every time.
    async fn merge_node(&self, node: &NodeRef, on_create: &Props, attrs: &Props) -> Result<(), GraphError>;

    async fn upsert_node(&self, node: &NodeRef, attrs: &Props) -> Result<(), GraphError> {
        self.merge_node(node, &Props::new(), attrs).await
    }

    /// Merge an edge between two existing nodes and refresh its properties.
    /// Fails with `MissingEndpoint` rather than creating stub nodes.
    async fn upsert_edge(&self, from: &NodeRef, rel: RelType, to: &NodeRef, props: &Props) -> Result<(), GraphError>;

    async fn node(&self, node: &NodeRef) -> Result<Option<NodeRecord>, GraphError>;

    /// Every relationship touching `node`, in both directions.
    async fn neighbors(&self, node: &NodeRef) -> Result<Vec<Neighbor>, GraphError>;

    async fn nodes(&self, label: Label) -> Result<Vec<NodeRecord>, GraphError>;

    async fn edges(&self, rel: RelType) -> Result<Vec<EdgeRecord>, GraphError>;

    async fn counts(&self) -> Result<GraphCounts, GraphError>;
}

/// Write `a -rel-> b` and `b -rel-> a` so the fact is traversable from either side.
pub async fn upsert_mirrored(
    store: &dyn GraphStore,
    a: &NodeRef,
    rel: RelType,
    b: &NodeRef,
    props: &Props,
) -> Result<(), GraphError> {
    store.upsert_edge(a, rel, b, props).await?;
    store.upsert_edge(b, rel, a, props).await
}

/// Look up an entity by slug as a Person, then as a Company.
pub async fn find_entity(store: &dyn GraphStore, slug: &str) -> Result<NodeRecord, GraphError> {
    if let Some(person) = store.node(&NodeRef::person(slug)).await? {
        return Ok(person);
    }
    store
        .node(&NodeRef::company(slug))
        .await?
        .ok_or_else(|| GraphError::UnknownNode(slug.to_string()))
}
