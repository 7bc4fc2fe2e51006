use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_common::keywords::significant_words;
use tigerclaw_common::{Label, RelType};

use crate::props::{NodeRecord, NodeRef, Props};
use crate::store::{GraphError, GraphStore};

const MIN_SHARED: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjacentPair {
    pub a: String,
    pub b: String,
    pub shared: Vec<String>,
}

/// Pairs of themes whose primitives share at least two significant words.
pub fn adjacent_pairs(themes: &[NodeRecord]) -> Vec<AdjacentPair> {
    let vocab: Vec<(&str, BTreeSet<String>)> = themes
        .iter()
        .map(|t| (t.key(), significant_words(t.primitive().unwrap_or_default())))
        .collect();

    let mut pairs = Vec::new();
    for (i, (a, wa)) in vocab.iter().enumerate() {
        for (b, wb) in &vocab[i + 1..] {
            let shared: Vec<String> = wa.intersection(wb).cloned().collect();
            if shared.len() >= MIN_SHARED {
                pairs.push(AdjacentPair {
                    a: a.to_string(),
                    b: b.to_string(),
                    shared,
                });
            }
        }
    }
    pairs
}

/// Write one ADJACENT_TO edge per adjacent theme pair. Returns the pairs
/// that were written.
pub async fn derive_adjacency(store: &dyn GraphStore) -> Result<Vec<AdjacentPair>, GraphError> {
    let themes = store.nodes(Label::Theme).await?;
    let pairs = adjacent_pairs(&themes);

    let mut written = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let from = NodeRef::theme(pair.a.as_str());
        let to = NodeRef::theme(pair.b.as_str());
        let props = Props::new()
            .with("shared", pair.shared.join(", "))
            .with("source", "primitive_overlap");
        match store.upsert_edge(&from, RelType::AdjacentTo, &to, &props).await {
            Ok(()) => written.push(pair),
            Err(e) => warn!(error = %e, a = %pair.a, b = %pair.b, "Failed to write adjacency"),
        }
    }
    info!(themes = themes.len(), adjacent = written.len(), "Theme adjacency derived");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;

    async fn theme(g: &MemoryGraph, key: &str, primitive: &str) -> NodeRef {
        let node = NodeRef::theme(key);
        g.upsert_node(&node, &Props::new().with("primitive", primitive)).await.unwrap();
        node
    }

    #[tokio::test]
    async fn shared_primitive_words_make_themes_adjacent() {
        let g = MemoryGraph::new();
        let optics = theme(&g, "THE-1", "Optical interconnect for datacenter fabrics").await;
        let cpo = theme(&g, "THE-2", "Co-packaged optical interconnect").await;
        let bio = theme(&g, "THE-3", "Protein design with diffusion models").await;

        let pairs = derive_adjacency(&g).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].shared, vec!["interconnect", "optical"]);
        assert!(g.has_edge(&optics, RelType::AdjacentTo, &cpo));
        assert!(!g.has_edge(&optics, RelType::AdjacentTo, &bio));

        // Re-deriving does not add edges.
        let before = g.edge_count();
        derive_adjacency(&g).await.unwrap();
        assert_eq!(g.edge_count(), before);
    }

    #[test]
    fn stopwords_and_short_words_do_not_count() {
        let themes = vec![
            NodeRecord::new(NodeRef::theme("A"), Props::new().with("primitive", "AI for the edge via RISC")),
            NodeRecord::new(NodeRef::theme("B"), Props::new().with("primitive", "AI for the cloud via GPUs")),
        ];
        assert!(adjacent_pairs(&themes).is_empty());
    }
}
