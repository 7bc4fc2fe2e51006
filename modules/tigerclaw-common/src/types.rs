use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::names::is_likely_person_name;
use crate::slug::slugify;

// ---------------------------------------------------------------------------
// Pipeline vocabulary
// ---------------------------------------------------------------------------

/// Pipeline decision for a person or company. "Unset" is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ReachOut,
    Watch,
    InProgress,
    Pass,
    Done,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ReachOut => "REACH_OUT",
            Action::Watch => "WATCH",
            Action::InProgress => "IN_PROGRESS",
            Action::Pass => "PASS",
            Action::Done => "DONE",
        }
    }

    /// Weight of a node with this action as a proximity anchor.
    pub fn excellence_weight(&self) -> f64 {
        match self {
            Action::ReachOut => 3.0,
            Action::InProgress | Action::Watch => 2.0,
            Action::Pass | Action::Done => 0.0,
        }
    }

    /// Actively-tracked states used by the compound detectors.
    pub fn is_tracked(&self) -> bool {
        matches!(self, Action::ReachOut | Action::Watch | Action::InProgress)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Accepts `REACH_OUT`, `reach out`, and annotated forms such as
    /// `PASS - low score` (only the part before ` - ` is read).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let head = raw.split(" - ").next().unwrap_or_default().trim();
        match head.to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "REACH_OUT" => Ok(Action::ReachOut),
            "WATCH" => Ok(Action::Watch),
            "IN_PROGRESS" => Ok(Action::InProgress),
            "PASS" => Ok(Action::Pass),
            "DONE" => Ok(Action::Done),
            _ => Err(format!("unknown action '{raw}'")),
        }
    }
}

/// Excellence weight of an optional action; unset contributes nothing.
pub fn excellence_weight(action: Option<Action>) -> f64 {
    action.map(|a| a.excellence_weight()).unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Strong,
    Medium,
    Weak,
}

impl SignalStrength {
    /// Merge precedence: strong > medium > weak.
    pub fn rank(&self) -> u8 {
        match self {
            SignalStrength::Strong => 3,
            SignalStrength::Medium => 2,
            SignalStrength::Weak => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Strong => "strong",
            SignalStrength::Medium => "medium",
            SignalStrength::Weak => "weak",
        }
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStrength {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strong" => Ok(SignalStrength::Strong),
            "medium" => Ok(SignalStrength::Medium),
            "weak" => Ok(SignalStrength::Weak),
            _ => Err(format!("unknown signal strength '{raw}'")),
        }
    }
}

/// Strength band of a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Strong,
    Medium,
    Weak,
    Pass,
}

impl Band {
    pub const STRONG_MIN: i32 = 8;
    pub const MEDIUM_MIN: i32 = 4;
    pub const WEAK_MIN: i32 = 1;

    pub fn from_score(score: i32) -> Self {
        if score >= Self::STRONG_MIN {
            Band::Strong
        } else if score >= Self::MEDIUM_MIN {
            Band::Medium
        } else if score >= Self::WEAK_MIN {
            Band::Weak
        } else {
            Band::Pass
        }
    }

    pub fn strength(&self) -> Option<SignalStrength> {
        match self {
            Band::Strong => Some(SignalStrength::Strong),
            Band::Medium => Some(SignalStrength::Medium),
            Band::Weak => Some(SignalStrength::Weak),
            Band::Pass => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    ScanCandidate,
    Reference,
    LatentFounder,
}

impl PersonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonType::ScanCandidate => "scan_candidate",
            PersonType::Reference => "reference",
            PersonType::LatentFounder => "latent_founder",
        }
    }
}

impl FromStr for PersonType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "scan_candidate" => Ok(PersonType::ScanCandidate),
            "reference" => Ok(PersonType::Reference),
            "latent_founder" => Ok(PersonType::LatentFounder),
            _ => Err(format!("unknown person type '{raw}'")),
        }
    }
}

/// How squarely a prospect sits inside a theme's thesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThesisFit {
    Direct,
    Adjacent,
    Tangential,
}

impl ThesisFit {
    /// HAS_EXPERTISE_IN confidence when seeding the graph from the index.
    pub fn confidence(fit: Option<ThesisFit>) -> f64 {
        match fit {
            Some(ThesisFit::Direct) => 0.9,
            Some(ThesisFit::Adjacent) => 0.6,
            Some(ThesisFit::Tangential) => 0.3,
            None => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThesisFit::Direct => "direct",
            ThesisFit::Adjacent => "adjacent",
            ThesisFit::Tangential => "tangential",
        }
    }
}

impl FromStr for ThesisFit {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ThesisFit::Direct),
            "adjacent" => Ok(ThesisFit::Adjacent),
            "tangential" => Ok(ThesisFit::Tangential),
            _ => Err(format!("unknown thesis fit '{raw}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Person,
    Company,
}

/// Deserialize an optional enum from a string, treating unparseable values
/// as absent. Scanner output is loosely typed; a bad enum value must not
/// discard the whole record.
pub fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Graph vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Person,
    Company,
    Theme,
    Institution,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::Person, Label::Company, Label::Theme, Label::Institution];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Person => "Person",
            Label::Company => "Company",
            Label::Theme => "Theme",
            Label::Institution => "Institution",
        }
    }

    /// Property holding the node's unique key.
    pub fn key_field(&self) -> &'static str {
        match self {
            Label::Person | Label::Company => "slug",
            Label::Theme => "key",
            Label::Institution => "name",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Person" => Ok(Label::Person),
            "Company" => Ok(Label::Company),
            "Theme" => Ok(Label::Theme),
            "Institution" => Ok(Label::Institution),
            _ => Err(format!("unknown label '{raw}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelType {
    Coauthored,
    WorkedWith,
    AdvisedBy,
    AffiliatedWith,
    WorkedAt,
    Founded,
    HasExpertiseIn,
    RelatedToTheme,
    AdjacentTo,
    RippleScored,
    InvestedIn,
    LedRound,
    RoundFor,
    CustomerOf,
}

impl RelType {
    pub const ALL: [RelType; 14] = [
        RelType::Coauthored,
        RelType::WorkedWith,
        RelType::AdvisedBy,
        RelType::AffiliatedWith,
        RelType::WorkedAt,
        RelType::Founded,
        RelType::HasExpertiseIn,
        RelType::RelatedToTheme,
        RelType::AdjacentTo,
        RelType::RippleScored,
        RelType::InvestedIn,
        RelType::LedRound,
        RelType::RoundFor,
        RelType::CustomerOf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Coauthored => "COAUTHORED",
            RelType::WorkedWith => "WORKED_WITH",
            RelType::AdvisedBy => "ADVISED_BY",
            RelType::AffiliatedWith => "AFFILIATED_WITH",
            RelType::WorkedAt => "WORKED_AT",
            RelType::Founded => "FOUNDED",
            RelType::HasExpertiseIn => "HAS_EXPERTISE_IN",
            RelType::RelatedToTheme => "RELATED_TO_THEME",
            RelType::AdjacentTo => "ADJACENT_TO",
            RelType::RippleScored => "RIPPLE_SCORED",
            RelType::InvestedIn => "INVESTED_IN",
            RelType::LedRound => "LED_ROUND",
            RelType::RoundFor => "ROUND_FOR",
            RelType::CustomerOf => "CUSTOMER_OF",
        }
    }

    /// Tie strength used by proximity and ripple traversal.
    pub fn weight(&self) -> f64 {
        match self {
            RelType::Coauthored => 4.0,
            RelType::WorkedWith | RelType::Founded | RelType::WorkedAt => 3.0,
            RelType::HasExpertiseIn | RelType::RelatedToTheme => 2.0,
            _ => 1.0,
        }
    }

    /// Audit edges record past propagation and are never walked.
    pub fn is_audit(&self) -> bool {
        matches!(self, RelType::RippleScored)
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        RelType::ALL
            .iter()
            .find(|r| r.as_str() == raw)
            .copied()
            .ok_or_else(|| format!("unknown relationship type '{raw}'"))
    }
}

// ---------------------------------------------------------------------------
// Signal record
// ---------------------------------------------------------------------------

/// Profile links reported by scanners. Flattened into signal records and
/// nested under `links` in index entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, alias = "paper", skip_serializing_if = "Option::is_none")]
    pub arxiv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Links {
    pub fn entries(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("github", self.github.as_deref()),
            ("linkedin", self.linkedin.as_deref()),
            ("arxiv", self.arxiv.as_deref()),
            ("twitter", self.twitter.as_deref()),
            ("website", self.website.as_deref()),
        ]
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v)
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.map_or(true, str::is_empty))
    }
}

/// Where a signal came from and how the scan classified it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "_source_url", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(rename = "_search_domain", default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "_signal_type", default, skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<String>,
    #[serde(rename = "_themes", default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,
    #[serde(rename = "_theme_relevance", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub theme_relevance: BTreeMap<String, f64>,
    #[serde(rename = "_work_keywords", default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// One prospect sighting as produced by a scanner.
///
/// Unknown fields are ignored and unparseable enum values read as absent, so
/// a single sloppy field never drops the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entity: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<SignalStrength>,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, deserialize_with = "lenient_enum", skip_serializing_if = "Option::is_none")]
    pub thesis_fit: Option<ThesisFit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funded: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inflection_indicators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_signal: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phd_defense_months: Option<u32>,
    #[serde(rename = "_github_followers", default, skip_serializing_if = "Option::is_none")]
    pub github_followers: Option<u64>,
    #[serde(rename = "_twitter_followers", default, skip_serializing_if = "Option::is_none")]
    pub twitter_followers: Option<u64>,
    #[serde(flatten)]
    pub links: Links,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl SignalRecord {
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    pub fn is_named(&self) -> bool {
        is_likely_person_name(&self.name)
    }

    /// Affiliation, or the free-text background when no affiliation was given.
    pub fn affiliation_text(&self) -> Option<&str> {
        self.affiliation
            .as_deref()
            .or(self.background.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Best-fit theme: the first theme the scan tagged.
    pub fn primary_theme(&self) -> Option<&str> {
        self.provenance.themes.first().map(String::as_str)
    }

    /// Highest theme relevance, 0 when untagged.
    pub fn best_relevance(&self) -> f64 {
        self.provenance
            .theme_relevance
            .values()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Paper reference used for co-author lookup.
    pub fn paper_ref(&self) -> Option<&str> {
        self.links
            .arxiv
            .as_deref()
            .or(self.provenance.source_url.as_deref())
            .filter(|s| !s.is_empty())
    }
}
