//! Network ingestion scenarios against the in-memory graph.
//!
//! Run with: cargo test -p tigerclaw-graph --test ingest_test

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use tigerclaw_common::{Action, RelType, SignalRecord, SignalStrength};
use tigerclaw_graph::memory::MemoryGraph;
use tigerclaw_graph::{ingest, ripple, CoauthorSource, GraphStore, IngestOptions, NodeRef, Props};

/// Paper reference → author list, standing in for the enrichment cache.
struct Papers(BTreeMap<String, Vec<String>>);

#[async_trait]
impl CoauthorSource for Papers {
    async fn coauthors(&self, paper_ref: &str) -> Option<Vec<String>> {
        self.0.get(paper_ref).cloned()
    }
}

const PAPER: &str = "https://arxiv.org/abs/2401.01234v2";

fn papers() -> Papers {
    let mut map = BTreeMap::new();
    map.insert(
        PAPER.to_string(),
        vec!["Jane Doe".to_string(), "Wei Liu".to_string(), "et al".to_string()],
    );
    Papers(map)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn opts() -> IngestOptions {
    IngestOptions { today: today(), dry_run: false }
}

fn batch() -> Vec<SignalRecord> {
    serde_json::from_value(json!([
        {
            "name": "Jane Doe",
            "affiliation": "PhD candidate, MIT CSAIL",
            "arxiv": PAPER,
            "_themes": ["THE-1"],
            "signal_strength": "strong"
        },
        {
            "name": "Omar Haddad",
            "background": "Postdoc at MIT",
            "_themes": ["THE-1"]
        },
        {
            "name": "github.com/someone",
            "affiliation": "MIT"
        }
    ]))
    .unwrap()
}

async fn graph_with_theme() -> MemoryGraph {
    let g = MemoryGraph::new();
    g.upsert_node(&NodeRef::theme("THE-1"), &Props::new().with("title", "Photonic compute"))
        .await
        .unwrap();
    g
}

#[tokio::test]
async fn coauthor_becomes_mirrored_reference() {
    let g = graph_with_theme().await;
    let stats = ingest(&g, &papers(), &batch(), opts()).await.unwrap();

    assert_eq!(stats.candidates, 2);
    assert_eq!(stats.skipped_names, 1);
    assert_eq!(stats.references, 1);
    assert_eq!(stats.coauthor_edges, 2);

    let jane = NodeRef::person("jane-doe");
    let wei = NodeRef::person("wei-liu");
    let wei_props = g.props(&wei).expect("reference node");
    assert_eq!(wei_props.str("type"), Some("reference"));
    assert_eq!(wei_props.str("name"), Some("Wei Liu"));
    assert!(g.has_edge(&jane, RelType::Coauthored, &wei));
    assert!(g.has_edge(&wei, RelType::Coauthored, &jane));

    let edge = g.edge_props(&jane, RelType::Coauthored, &wei).unwrap();
    assert_eq!(edge.str("paper_url"), Some(PAPER));
    assert_eq!(edge.str("source"), Some("scan_ingest"));
}

#[tokio::test]
async fn candidates_citing_each_other_share_one_mirrored_pair() {
    let g = MemoryGraph::new();
    let mut map = BTreeMap::new();
    map.insert(
        "https://arxiv.org/abs/2402.00001".to_string(),
        vec!["Ana Lopez".to_string(), "Ben Okafor".to_string()],
    );
    map.insert(
        "https://arxiv.org/abs/2402.00002".to_string(),
        vec!["Ben Okafor".to_string(), "Ana Lopez".to_string()],
    );
    let batch: Vec<SignalRecord> = serde_json::from_value(json!([
        { "name": "Ana Lopez", "arxiv": "https://arxiv.org/abs/2402.00001" },
        { "name": "Ben Okafor", "arxiv": "https://arxiv.org/abs/2402.00002" }
    ]))
    .unwrap();

    let stats = ingest(&g, &Papers(map), &batch, opts()).await.unwrap();
    assert_eq!(stats.candidates, 2);
    assert_eq!(stats.references, 0);
    assert_eq!(stats.coauthor_edges, 2);

    let ana = NodeRef::person("ana-lopez");
    let ben = NodeRef::person("ben-okafor");
    assert_eq!(g.edges(RelType::Coauthored).await.unwrap().len(), 2);
    let forward = g.edge_props(&ana, RelType::Coauthored, &ben).expect("ana -> ben");
    let back = g.edge_props(&ben, RelType::Coauthored, &ana).expect("ben -> ana");
    assert_eq!(forward, back);

    g.upsert_node(&ana, &Props::new().with("action", Action::Watch)).await.unwrap();
    let report = ripple(&g, "ben-okafor", "fundraise", SignalStrength::Strong).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].key, "ana-lopez");
    assert_eq!(report.results[0].paths, 1);
    assert_eq!(report.results[0].current_action, Some(Action::Watch));
}

#[tokio::test]
async fn shared_institution_links_candidates() {
    let g = graph_with_theme().await;
    let stats = ingest(&g, &papers(), &batch(), opts()).await.unwrap();

    assert_eq!(stats.institution_edges, 2);
    assert_eq!(stats.affiliation_edges, 1);

    let jane = NodeRef::person("jane-doe");
    let omar = NodeRef::person("omar-haddad");
    let mit = NodeRef::institution("MIT");
    assert!(g.has_edge(&jane, RelType::AffiliatedWith, &mit));
    assert!(g.has_edge(&omar, RelType::AffiliatedWith, &mit));

    let ww = g
        .edge_props(&jane, RelType::WorkedWith, &omar)
        .or_else(|| g.edge_props(&omar, RelType::WorkedWith, &jane))
        .expect("worked-with edge");
    assert_eq!(ww.str("context"), Some("MIT"));
}

#[tokio::test]
async fn candidates_get_scan_expertise_and_never_an_action() {
    let g = graph_with_theme().await;
    let stats = ingest(&g, &papers(), &batch(), opts()).await.unwrap();
    assert_eq!(stats.theme_edges, 2);

    let jane = NodeRef::person("jane-doe");
    let expertise = g
        .edge_props(&jane, RelType::HasExpertiseIn, &NodeRef::theme("THE-1"))
        .unwrap();
    assert_eq!(expertise.str("type"), Some("scan"));
    assert_eq!(expertise.f64("confidence"), Some(0.5));

    let props = g.props(&jane).unwrap();
    assert_eq!(props.str("type"), Some("scan_candidate"));
    assert_eq!(props.str("last_seen"), Some("2026-03-01"));
    assert_eq!(props.str("action"), None);
}

#[tokio::test]
async fn reingesting_the_same_batch_changes_nothing() {
    let g = graph_with_theme().await;
    ingest(&g, &papers(), &batch(), opts()).await.unwrap();
    let before = g.counts().await.unwrap();

    ingest(&g, &papers(), &batch(), opts()).await.unwrap();
    assert_eq!(g.counts().await.unwrap(), before);
}

#[tokio::test]
async fn existing_action_survives_ingestion() {
    let g = graph_with_theme().await;
    let jane = NodeRef::person("jane-doe");
    g.upsert_node(
        &jane,
        &Props::new().with("name", "Jane Doe").with("action", Action::ReachOut).with("type", "latent_founder"),
    )
    .await
    .unwrap();

    ingest(&g, &papers(), &batch(), opts()).await.unwrap();
    let props = g.props(&jane).unwrap();
    assert_eq!(props.str("action"), Some("REACH_OUT"));
    assert_eq!(props.str("type"), Some("latent_founder"));
}

#[tokio::test]
async fn later_sighting_promotes_a_reference() {
    let g = graph_with_theme().await;
    ingest(&g, &papers(), &batch(), opts()).await.unwrap();

    let wei: Vec<SignalRecord> = serde_json::from_value(json!([{ "name": "Wei Liu" }])).unwrap();
    ingest(&g, &papers(), &wei, opts()).await.unwrap();
    assert_eq!(
        g.props(&NodeRef::person("wei-liu")).unwrap().str("type"),
        Some("scan_candidate")
    );
}

#[tokio::test]
async fn missing_theme_is_skipped_not_fatal() {
    let g = MemoryGraph::new();
    let stats = ingest(&g, &papers(), &batch(), opts()).await.unwrap();
    assert_eq!(stats.theme_edges, 0);
    assert_eq!(stats.candidates, 2);
}

#[tokio::test]
async fn dry_run_counts_without_writing() {
    let g = graph_with_theme().await;
    let stats = ingest(&g, &papers(), &batch(), IngestOptions { today: today(), dry_run: true })
        .await
        .unwrap();
    assert!(stats.dry_run);
    assert_eq!(stats.candidates, 2);
    assert_eq!(stats.coauthor_edges, 2);
    assert_eq!(g.node_count(), 1);
    assert_eq!(g.edge_count(), 0);
}
