//! In-memory model of the pipeline index file: the single source of truth
//! consulted by scan diffing. Reading and writing the file lives in the
//! scout crate's index store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{lenient_enum, Action, EntityKind, Links, PersonType, SignalStrength, ThesisFit};

pub const INDEX_VERSION: u32 = 1;

/// Relationship hints recorded by operators or past enrichment. Synced into
/// the graph as typed edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub co_authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_companies: Vec<String>,
    /// Company entries only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub founders: Vec<String>,
}

impl Relationships {
    pub fn is_empty(&self) -> bool {
        self == &Relationships::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PersonType>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<SignalStrength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funded: Option<bool>,
    #[serde(default, skip_serializing_if = "Links::is_empty")]
    pub links: Links,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub thesis_fit: Option<ThesisFit>,
    #[serde(default, skip_serializing_if = "Relationships::is_empty")]
    pub relationships: Relationships,
}

impl IndexEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: None,
            linear: None,
            theme: None,
            kind: None,
            last_seen: None,
            memo: None,
            signal_strength: None,
            work: None,
            background: None,
            product: None,
            funded: None,
            links: Links::default(),
            thesis_fit: None,
            relationships: Relationships::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIndex {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDate>,
    #[serde(default)]
    pub people: BTreeMap<String, IndexEntry>,
    #[serde(default)]
    pub companies: BTreeMap<String, IndexEntry>,
}

fn default_version() -> u32 {
    INDEX_VERSION
}

impl Default for PipelineIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            updated_at: None,
            people: BTreeMap::new(),
            companies: BTreeMap::new(),
        }
    }
}

impl PipelineIndex {
    pub fn collection(&self, kind: EntityKind) -> &BTreeMap<String, IndexEntry> {
        match kind {
            EntityKind::Person => &self.people,
            EntityKind::Company => &self.companies,
        }
    }

    pub fn collection_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, IndexEntry> {
        match kind {
            EntityKind::Person => &mut self.people,
            EntityKind::Company => &mut self.companies,
        }
    }

    pub fn get(&self, kind: EntityKind, slug: &str) -> Option<&IndexEntry> {
        self.collection(kind).get(slug)
    }

    pub fn upsert(&mut self, kind: EntityKind, slug: String, entry: IndexEntry) {
        self.collection_mut(kind).insert(slug, entry);
    }

    pub fn len(&self) -> usize {
        self.people.len() + self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp; anything else reads as
/// absent.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}
