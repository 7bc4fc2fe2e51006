//! Scan diff: sort a merged batch into NEW, CHANGED and KNOWN against the
//! pipeline index.

use chrono::NaiveDate;
use serde::Serialize;

use tigerclaw_common::{Action, IndexEntry, PipelineIndex, SignalRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Option<String>,
    pub to: String,
}

impl FieldChange {
    fn new(field: impl Into<String>, from: Option<String>, to: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from,
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    New,
    Changed,
    Known,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub slug: String,
    pub status: DiffStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDate>,
    pub record: SignalRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanDiff {
    pub new: Vec<DiffEntry>,
    pub changed: Vec<DiffEntry>,
    pub known: Vec<DiffEntry>,
}

impl ScanDiff {
    pub fn summary(&self) -> String {
        format!(
            "{} new, {} changed, {} known",
            self.new.len(),
            self.changed.len(),
            self.known.len()
        )
    }
}

fn differs<T: PartialEq>(existing: Option<T>, incoming: Option<T>) -> Option<(T, T)> {
    match (existing, incoming) {
        (Some(e), Some(i)) if e != i => Some((e, i)),
        _ => None,
    }
}

fn newly_populated(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let incoming = incoming.filter(|v| !v.is_empty())?;
    existing.filter(|v| !v.is_empty()).is_none().then(|| incoming.to_string())
}

/// Field-level differences that make a known entity worth another look.
///
/// Action, theme and strength count only when both sides carry a value;
/// content fields and links count when the scan fills something the index
/// lacks.
pub fn detect_changes(existing: &IndexEntry, incoming: &SignalRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    if let Some((from, to)) = differs(existing.action, incoming.action) {
        changes.push(FieldChange::new("action", Some(from.to_string()), to.to_string()));
    }
    if let Some((from, to)) = differs(existing.theme.as_deref(), incoming.primary_theme()) {
        changes.push(FieldChange::new("theme", Some(from.to_string()), to));
    }
    if let Some((from, to)) = differs(existing.signal_strength, incoming.signal_strength) {
        changes.push(FieldChange::new("signal_strength", Some(from.to_string()), to.to_string()));
    }

    let content = [
        ("work", existing.work.as_deref(), incoming.work.as_deref()),
        ("background", existing.background.as_deref(), incoming.affiliation_text()),
        ("product", existing.product.as_deref(), incoming.product.as_deref()),
    ];
    for (field, had, has) in content {
        if let Some(to) = newly_populated(had, has) {
            changes.push(FieldChange::new(field, None, to));
        }
    }
    // Only a newly reported raise counts; "not funded" is no news.
    if incoming.funded == Some(true) && existing.funded != Some(true) {
        changes.push(FieldChange::new("funded", existing.funded.map(|f| f.to_string()), "true"));
    }

    for (key, url) in incoming.links.entries() {
        if let Some(to) = newly_populated(existing.links.get(key), url) {
            changes.push(FieldChange::new(format!("links.{key}"), None, to));
        }
    }
    changes
}

/// Diff a merged batch against the index. Records without a usable slug are
/// skipped.
pub fn diff(records: Vec<SignalRecord>, index: &PipelineIndex) -> ScanDiff {
    let mut out = ScanDiff::default();
    for record in records {
        let slug = record.slug();
        if slug.is_empty() {
            continue;
        }
        let Some(existing) = index.get(record.entity, &slug) else {
            out.new.push(DiffEntry {
                slug,
                status: DiffStatus::New,
                changes: Vec::new(),
                existing_action: None,
                last_seen: None,
                record,
            });
            continue;
        };

        let changes = detect_changes(existing, &record);
        let status = if changes.is_empty() {
            DiffStatus::Known
        } else {
            DiffStatus::Changed
        };
        let entry = DiffEntry {
            slug,
            status,
            changes,
            existing_action: existing.action,
            last_seen: existing.last_seen,
            record,
        };
        match status {
            DiffStatus::Changed => out.changed.push(entry),
            _ => out.known.push(entry),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tigerclaw_common::EntityKind;

    fn index() -> PipelineIndex {
        let mut index = PipelineIndex::default();
        let mut jane = IndexEntry::new("Jane Doe");
        jane.action = Some(Action::Watch);
        jane.theme = Some("THE-1".into());
        jane.work = Some("Photonic tensor cores".into());
        jane.links.github = Some("https://github.com/janedoe".into());
        index.upsert(EntityKind::Person, "jane-doe".into(), jane);

        let mut lumen = IndexEntry::new("Lumen Labs");
        lumen.action = Some(Action::Watch);
        index.upsert(EntityKind::Company, "lumen-labs".into(), lumen);
        index
    }

    fn record(value: serde_json::Value) -> SignalRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn action_change_is_one_field_delta() {
        let d = diff(vec![record(json!({"name": "Jane Doe", "action": "REACH_OUT"}))], &index());
        assert_eq!(d.changed.len(), 1);
        let changes = &d.changed[0].changes;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "action");
        assert_eq!(changes[0].from.as_deref(), Some("WATCH"));
        assert_eq!(changes[0].to, "REACH_OUT");
        assert_eq!(d.changed[0].existing_action, Some(Action::Watch));
    }

    #[test]
    fn identical_record_is_known() {
        let d = diff(
            vec![record(json!({"name": "Jane Doe", "action": "WATCH", "_themes": ["THE-1"],
                               "work": "Something else", "github": "https://github.com/janedoe"}))],
            &index(),
        );
        assert_eq!(d.known.len(), 1);
        assert!(d.changed.is_empty());
        assert_eq!(d.summary(), "0 new, 0 changed, 1 known");
    }

    #[test]
    fn new_content_and_links_are_changes() {
        let d = diff(
            vec![record(json!({"name": "Jane Doe", "affiliation": "MIT", "arxiv": "https://arxiv.org/abs/1"}))],
            &index(),
        );
        let fields: Vec<&str> = d.changed[0].changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["background", "links.arxiv"]);
    }

    #[test]
    fn only_a_new_raise_flags_funded() {
        let d = diff(
            vec![record(json!({"name": "Jane Doe", "action": "WATCH", "_themes": ["THE-1"], "funded": false}))],
            &index(),
        );
        assert_eq!(d.known.len(), 1);

        let d = diff(
            vec![record(json!({"name": "Jane Doe", "action": "WATCH", "_themes": ["THE-1"], "funded": true}))],
            &index(),
        );
        assert_eq!(d.changed.len(), 1);
        let change = &d.changed[0].changes[0];
        assert_eq!(change.field, "funded");
        assert_eq!(change.from, None);
        assert_eq!(change.to, "true");

        let mut funded = index();
        let mut jane = funded.get(EntityKind::Person, "jane-doe").unwrap().clone();
        jane.funded = Some(true);
        funded.upsert(EntityKind::Person, "jane-doe".into(), jane);
        let d = diff(
            vec![record(json!({"name": "Jane Doe", "action": "WATCH", "_themes": ["THE-1"], "funded": true}))],
            &funded,
        );
        assert_eq!(d.known.len(), 1);
    }

    #[test]
    fn unknown_slug_is_new_and_companies_use_their_own_collection() {
        let d = diff(
            vec![
                record(json!({"name": "Wei Liu"})),
                record(json!({"name": "Lumen Labs", "entity": "company"})),
                record(json!({"name": "Lumen Labs"})),
                record(json!({"name": "!!!"})),
            ],
            &index(),
        );
        assert_eq!(d.new.len(), 2);
        assert_eq!(d.known.len(), 1);
        assert_eq!(d.summary(), "2 new, 0 changed, 1 known");
    }
}
