//! Neo4j backend contract tests.
//!
//! Requirements: Docker (for Neo4j via testcontainers)
//!
//! Run with: cargo test -p tigerclaw-graph --features test-utils --test neo4j_store_test

#![cfg(feature = "test-utils")]

use tigerclaw_common::{Action, Label, RelType};
use tigerclaw_graph::testutil::neo4j_store;
use tigerclaw_graph::{upsert_mirrored, GraphError, GraphStore, NodeRef, Props};

#[tokio::test]
async fn upserts_are_idempotent() {
    let (_container, store) = neo4j_store().await;
    store.ensure_schema().await.expect("schema is idempotent");

    let jane = NodeRef::person("jane-doe");
    let wei = NodeRef::person("wei-liu");
    for _ in 0..2 {
        store
            .upsert_node(&jane, &Props::new().with("name", "Jane Doe").with("last_seen", "2026-03-01"))
            .await
            .unwrap();
        store.upsert_node(&wei, &Props::new().with("name", "Wei Liu")).await.unwrap();
        upsert_mirrored(&store, &jane, RelType::Coauthored, &wei, &Props::new().with("source", "test"))
            .await
            .unwrap();
    }

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.nodes.get(&Label::Person), Some(&2));
    assert_eq!(counts.edges.get(&RelType::Coauthored), Some(&2));
}

#[tokio::test]
async fn create_only_attrs_do_not_overwrite() {
    let (_container, store) = neo4j_store().await;
    let jane = NodeRef::person("jane-doe");
    store
        .merge_node(&jane, &Props::new().with("type", "scan_candidate"), &Props::new().with("name", "Jane Doe"))
        .await
        .unwrap();
    store
        .merge_node(&jane, &Props::new().with("type", "reference"), &Props::new().with("action", Action::Watch))
        .await
        .unwrap();

    let node = store.node(&jane).await.unwrap().expect("node exists");
    assert_eq!(node.props.str("type"), Some("scan_candidate"));
    assert_eq!(node.action(), Some(Action::Watch));
    assert_eq!(node.name(), Some("Jane Doe"));
}

#[tokio::test]
async fn edge_to_missing_node_fails() {
    let (_container, store) = neo4j_store().await;
    let jane = NodeRef::person("jane-doe");
    store.upsert_node(&jane, &Props::new()).await.unwrap();

    let err = store
        .upsert_edge(&jane, RelType::HasExpertiseIn, &NodeRef::theme("THE-404"), &Props::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::MissingEndpoint { .. }));
    assert_eq!(store.counts().await.unwrap().total_nodes(), 1);
}

#[tokio::test]
async fn neighbors_report_both_directions() {
    let (_container, store) = neo4j_store().await;
    let jane = NodeRef::person("jane-doe");
    let theme = NodeRef::theme("THE-1");
    store.upsert_node(&jane, &Props::new().with("name", "Jane Doe")).await.unwrap();
    store.upsert_node(&theme, &Props::new().with("title", "Photonics")).await.unwrap();
    store
        .upsert_edge(&jane, RelType::HasExpertiseIn, &theme, &Props::new().with("confidence", 0.9))
        .await
        .unwrap();

    let from_jane = store.neighbors(&jane).await.unwrap();
    assert_eq!(from_jane.len(), 1);
    assert!(from_jane[0].outgoing);
    assert_eq!(from_jane[0].props.f64("confidence"), Some(0.9));

    let from_theme = store.neighbors(&theme).await.unwrap();
    assert_eq!(from_theme.len(), 1);
    assert!(!from_theme[0].outgoing);
    assert_eq!(from_theme[0].node.key(), "jane-doe");
}
