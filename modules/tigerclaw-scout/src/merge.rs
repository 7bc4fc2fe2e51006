//! Fan-in merge: tag untagged signals with themes, extract work keywords,
//! then collapse duplicates by source URL and by name.

use std::collections::{BTreeMap, HashMap};

use tigerclaw_common::keywords::{theme_keywords, work_keywords};
use tigerclaw_common::SignalRecord;

use crate::catalog::CatalogTheme;

/// Theme matches for a record the scanner did not tag: themes whose title
/// keywords appear in the record text, with relevance = matched / keywords.
/// A lone theme always matches; no match at all keeps every theme at 0.
pub fn classify(record: &SignalRecord, themes: &[&CatalogTheme]) -> Vec<(String, f64)> {
    if themes.is_empty() {
        return Vec::new();
    }
    let text = [
        Some(record.name.as_str()),
        record.work.as_deref(),
        record.affiliation_text(),
        record.status.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase();

    let matched: Vec<(String, f64)> = themes
        .iter()
        .filter_map(|theme| {
            let keywords = theme_keywords(&theme.title);
            let hits = keywords.iter().filter(|kw| text.contains(kw.as_str())).count();
            if hits == 0 && themes.len() > 1 {
                return None;
            }
            let relevance = if keywords.is_empty() {
                0.0
            } else {
                hits as f64 / keywords.len() as f64
            };
            Some((theme.key.clone(), relevance))
        })
        .collect();

    if matched.is_empty() {
        themes.iter().map(|t| (t.key.clone(), 0.0)).collect()
    } else {
        matched
    }
}

/// Per-record pre-pass before dedup.
pub fn prepare(record: &mut SignalRecord, domain: &str, themes_in_domain: &[&CatalogTheme]) {
    if record.provenance.domain.is_none() {
        record.provenance.domain = Some(domain.to_string());
    }
    if record.provenance.themes.is_empty() {
        let matches = classify(record, themes_in_domain);
        record.provenance.themes = matches.iter().map(|(k, _)| k.clone()).collect();
        record.provenance.theme_relevance = matches.into_iter().collect();
    }
    let text = format!(
        "{} {}",
        record.work.as_deref().unwrap_or_default(),
        record.primitive.as_deref().unwrap_or_default()
    );
    record.provenance.keywords = work_keywords(&text).into_iter().collect();
}

pub fn merge_relevance(into: &mut BTreeMap<String, f64>, from: &BTreeMap<String, f64>) {
    for (key, value) in from {
        let slot = into.entry(key.clone()).or_insert(*value);
        *slot = slot.max(*value);
    }
}

fn union(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Fold `from`'s theme tags and relevance into `into`.
fn absorb_themes(into: &mut SignalRecord, from: &SignalRecord) {
    union(&mut into.provenance.themes, &from.provenance.themes);
    merge_relevance(&mut into.provenance.theme_relevance, &from.provenance.theme_relevance);
}

fn absorb(into: &mut SignalRecord, from: &SignalRecord) {
    absorb_themes(into, from);
    union(&mut into.provenance.keywords, &from.provenance.keywords);
}

fn strength_rank(record: &SignalRecord) -> u8 {
    record.signal_strength.map(|s| s.rank()).unwrap_or(0)
}

fn name_key(record: &SignalRecord) -> Option<String> {
    let key = record.name.trim().to_lowercase();
    (!key.is_empty() && key != "anonymous").then_some(key)
}

/// Collapse duplicates: first by source URL (theme tags unioned), then by
/// normalized name keeping the strongest variant. Order of first sighting is
/// kept.
pub fn dedup(records: Vec<SignalRecord>) -> Vec<SignalRecord> {
    let mut by_url: Vec<SignalRecord> = Vec::with_capacity(records.len());
    let mut url_slots: HashMap<String, usize> = HashMap::new();
    for record in records {
        let url = record.provenance.source_url.clone().filter(|u| !u.is_empty());
        match url {
            Some(url) => match url_slots.get(&url) {
                Some(&slot) => absorb_themes(&mut by_url[slot], &record),
                None => {
                    url_slots.insert(url, by_url.len());
                    by_url.push(record);
                }
            },
            None => by_url.push(record),
        }
    }

    let mut by_name: Vec<SignalRecord> = Vec::with_capacity(by_url.len());
    let mut name_slots: HashMap<String, usize> = HashMap::new();
    for mut record in by_url {
        let Some(key) = name_key(&record) else {
            by_name.push(record);
            continue;
        };
        match name_slots.get(&key) {
            Some(&slot) => {
                let existing = &mut by_name[slot];
                if strength_rank(&record) > strength_rank(existing) {
                    absorb(&mut record, existing);
                    *existing = record;
                } else {
                    absorb(existing, &record);
                }
            }
            None => {
                name_slots.insert(key, by_name.len());
                by_name.push(record);
            }
        }
    }
    by_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tigerclaw_common::SignalStrength;

    fn record(value: serde_json::Value) -> SignalRecord {
        serde_json::from_value(value).unwrap()
    }

    fn themes() -> Vec<CatalogTheme> {
        vec![
            CatalogTheme {
                key: "THE-1".into(),
                title: "Photonic interconnect".into(),
                ..Default::default()
            },
            CatalogTheme {
                key: "THE-2".into(),
                title: "Protein design".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn classification_scores_by_title_keyword_hits() {
        let catalog = themes();
        let refs: Vec<&CatalogTheme> = catalog.iter().collect();
        let r = record(json!({"name": "Jane Doe", "work": "Silicon photonic links"}));
        assert_eq!(classify(&r, &refs), vec![("THE-1".to_string(), 0.5)]);

        let none = record(json!({"name": "Wei Liu", "work": "Compilers"}));
        let fallback = classify(&none, &refs);
        assert_eq!(fallback.len(), 2);
        assert!(fallback.iter().all(|(_, rel)| *rel == 0.0));

        let single = classify(&none, &refs[..1]);
        assert_eq!(single, vec![("THE-1".to_string(), 0.0)]);
    }

    #[test]
    fn prepare_keeps_scanner_tags_and_extracts_keywords() {
        let catalog = themes();
        let refs: Vec<&CatalogTheme> = catalog.iter().collect();
        let mut r = record(json!({
            "name": "Jane Doe",
            "work": "Novel photonic tensor cores",
            "_themes": ["THE-9"]
        }));
        prepare(&mut r, "compute", &refs);
        assert_eq!(r.provenance.themes, vec!["THE-9"]);
        assert_eq!(r.provenance.domain.as_deref(), Some("compute"));
        assert_eq!(r.provenance.keywords, vec!["cores", "photonic", "tensor"]);
    }

    #[test]
    fn same_url_unions_themes() {
        let merged = dedup(vec![
            record(json!({"name": "Jane Doe", "_source_url": "https://x.test/a", "_themes": ["THE-1"],
                          "_theme_relevance": {"THE-1": 0.2}})),
            record(json!({"name": "J. Doe", "_source_url": "https://x.test/a", "_themes": ["THE-2"],
                          "_theme_relevance": {"THE-1": 0.6, "THE-2": 0.4}})),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Jane Doe");
        assert_eq!(merged[0].provenance.themes, vec!["THE-1", "THE-2"]);
        assert_eq!(merged[0].provenance.theme_relevance["THE-1"], 0.6);
    }

    #[test]
    fn same_name_keeps_strongest_and_unions_tags() {
        let merged = dedup(vec![
            record(json!({"name": "Jane Doe", "signal_strength": "weak", "_themes": ["THE-1"],
                          "_work_keywords": ["optics"]})),
            record(json!({"name": "jane doe ", "signal_strength": "strong", "_themes": ["THE-2"],
                          "_work_keywords": ["lasers"]})),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].signal_strength, Some(SignalStrength::Strong));
        assert_eq!(merged[0].provenance.themes, vec!["THE-2", "THE-1"]);
        assert_eq!(merged[0].provenance.keywords, vec!["lasers", "optics"]);
    }

    #[test]
    fn anonymous_records_are_never_merged() {
        let merged = dedup(vec![
            record(json!({"name": "anonymous"})),
            record(json!({"name": "Anonymous"})),
            record(json!({"name": ""})),
        ]);
        assert_eq!(merged.len(), 3);
    }
}
