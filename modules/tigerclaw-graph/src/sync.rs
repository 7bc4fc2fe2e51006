//! Seed the graph from the pipeline index. Index actions are the decisions
//! operators have made, so this is the one place actions reach the graph.

use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_common::{slugify, EntityKind, IndexEntry, PersonType, PipelineIndex, RelType, ThesisFit};

use crate::props::{NodeRef, Props};
use crate::store::{upsert_mirrored, GraphError, GraphStore};

const COMPANY_THEME_CONFIDENCE: f64 = 0.7;
const SYNC_SOURCE: &str = "index_sync";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStats {
    pub people: usize,
    pub companies: usize,
    pub themes: usize,
    pub relationships: usize,
    pub errors: usize,
}

fn entity_props(entry: &IndexEntry) -> Props {
    Props::new()
        .with("name", entry.name.as_str())
        .with_opt("action", entry.action)
        .with_opt("theme", entry.theme.as_deref())
        .with_opt("last_seen", entry.last_seen)
}

async fn ensure_theme(store: &dyn GraphStore, key: &str) -> Result<NodeRef, GraphError> {
    let node = NodeRef::theme(key);
    store.merge_node(&node, &Props::new().with("title", key), &Props::new()).await?;
    Ok(node)
}

/// Named person referenced by a relationship hint; created as a reference
/// when not already known.
async fn ensure_person(store: &dyn GraphStore, name: &str) -> Result<Option<NodeRef>, GraphError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Ok(None);
    }
    let node = NodeRef::person(slug);
    let on_create = Props::new().with("name", name).with("type", PersonType::Reference);
    store.merge_node(&node, &on_create, &Props::new()).await?;
    Ok(Some(node))
}

/// Sync one index entry and its relationship hints. Returns how many
/// relationship edges were written.
pub async fn sync_entry(
    store: &dyn GraphStore,
    kind: EntityKind,
    slug: &str,
    entry: &IndexEntry,
) -> Result<usize, GraphError> {
    let hint = Props::new().with("source", SYNC_SOURCE);
    let mut written = 0;

    match kind {
        EntityKind::Person => {
            let me = NodeRef::person(slug);
            let person_type = entry.kind.unwrap_or(PersonType::LatentFounder);
            store
                .upsert_node(&me, &entity_props(entry).with("type", person_type))
                .await?;

            if let Some(theme) = entry.theme.as_deref() {
                let t = ensure_theme(store, theme).await?;
                let props = Props::new()
                    .with("type", "index")
                    .with("confidence", ThesisFit::confidence(entry.thesis_fit));
                store.upsert_edge(&me, RelType::HasExpertiseIn, &t, &props).await?;
            }

            let rel = &entry.relationships;
            if let Some(advisor) = rel.advisor.as_deref() {
                if let Some(a) = ensure_person(store, advisor).await? {
                    store.upsert_edge(&me, RelType::AdvisedBy, &a, &hint).await?;
                    written += 1;
                }
            }
            if let Some(lab) = rel.lab.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
                let inst = NodeRef::institution(lab);
                store.upsert_node(&inst, &Props::new()).await?;
                store.upsert_edge(&me, RelType::AffiliatedWith, &inst, &hint).await?;
                written += 1;
            }
            for company in &rel.prior_companies {
                let cslug = slugify(company);
                if cslug.is_empty() {
                    continue;
                }
                let c = NodeRef::company(cslug);
                store
                    .merge_node(&c, &Props::new().with("name", company.as_str()), &Props::new())
                    .await?;
                store.upsert_edge(&me, RelType::WorkedAt, &c, &hint).await?;
                written += 1;
            }
            for coauthor in &rel.co_authors {
                if let Some(other) = ensure_person(store, coauthor).await? {
                    if other != me {
                        upsert_mirrored(store, &me, RelType::Coauthored, &other, &hint).await?;
                        written += 2;
                    }
                }
            }
        }
        EntityKind::Company => {
            let me = NodeRef::company(slug);
            store
                .upsert_node(&me, &entity_props(entry).with_opt("funded", entry.funded))
                .await?;

            if let Some(theme) = entry.theme.as_deref() {
                let t = ensure_theme(store, theme).await?;
                let props = Props::new().with("confidence", COMPANY_THEME_CONFIDENCE);
                store.upsert_edge(&me, RelType::RelatedToTheme, &t, &props).await?;
            }
            for founder in &entry.relationships.founders {
                if let Some(f) = ensure_person(store, founder).await? {
                    store.upsert_edge(&f, RelType::Founded, &me, &hint).await?;
                    written += 1;
                }
            }
        }
    }
    Ok(written)
}

/// Sync the whole index. Each entry is synced independently; failures are
/// counted and logged.
pub async fn seed_from_index(store: &dyn GraphStore, index: &PipelineIndex) -> SyncStats {
    let mut stats = SyncStats::default();
    let mut themes = std::collections::BTreeSet::new();

    for kind in [EntityKind::Person, EntityKind::Company] {
        for (slug, entry) in index.collection(kind) {
            match sync_entry(store, kind, slug, entry).await {
                Ok(rels) => {
                    stats.relationships += rels;
                    match kind {
                        EntityKind::Person => stats.people += 1,
                        EntityKind::Company => stats.companies += 1,
                    }
                    if let Some(t) = entry.theme.as_deref() {
                        themes.insert(t.to_string());
                    }
                }
                Err(e) => {
                    warn!(error = %e, slug, "Failed to sync index entry");
                    stats.errors += 1;
                }
            }
        }
    }
    stats.themes = themes.len();

    info!(
        people = stats.people,
        companies = stats.companies,
        themes = stats.themes,
        relationships = stats.relationships,
        errors = stats.errors,
        "Index synced to graph"
    );
    stats
}
