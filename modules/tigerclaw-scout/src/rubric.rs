//! Mechanical scoring rubric for founder signals.
//!
//! A fixed, ordered rule table over boolean attributes. The flat score is the
//! sum of the rules that fire; the extended variant adds a recency gradient
//! and a convergence bonus. Both map to strength bands through [`Band`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use tigerclaw_common::{Action, Band, SignalRecord, SignalStrength, ThesisFit};
use tigerclaw_graph::ProximityResult;

const PHD_DEFENSE_WINDOW_MONTHS: u32 = 6;

// Group 1 marks a negated mention ("unfunded", "not yet funded").
static FUNDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(un|non-?|not\s+(?:yet\s+)?)?funded\b").unwrap());

fn mentions_funding(text: &str) -> bool {
    FUNDED.captures_iter(text).any(|c| c.get(1).is_none())
}
const STALE_AFTER_DAYS: i64 = 90;
const CONVERGENCE_MIN_RULES: usize = 3;
const CONVERGENCE_BONUS: i32 = 2;
const OSS_FOLLOWERS: u64 = 100;
const SOCIAL_FOLLOWERS: u64 = 1000;
const CONVERGING_INDICATORS: usize = 3;

/// Attributes the rubric tests. Accepts the synonyms scanners and operators
/// use for the same fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringAttrs {
    pub phd_defense: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phd_defense_months: Option<u32>,
    #[serde(alias = "left_lab", alias = "departure")]
    pub left_faang: bool,
    #[serde(alias = "active_repo")]
    pub new_repo: bool,
    #[serde(alias = "conference_top_venue")]
    pub conference: bool,
    #[serde(alias = "converging_signals", alias = "multiple_signals")]
    pub converging: bool,
    #[serde(alias = "large_tam")]
    pub venture_scale: bool,
    #[serde(alias = "prior_exit")]
    pub prior_startup: bool,
    pub oss_traction: bool,
    #[serde(alias = "twitter_active")]
    pub social_active: bool,
    pub academic_only: bool,
    #[serde(alias = "stale_signal")]
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_signal: Option<i64>,
    #[serde(alias = "funded")]
    pub already_funded: bool,
}

impl ScoringAttrs {
    /// Derive rubric attributes from a scanner record's indicators and status.
    pub fn from_signal(signal: &SignalRecord) -> Self {
        let indicators = signal.inflection_indicators.join(" ").to_lowercase();
        let status = signal.status.as_deref().unwrap_or_default().to_lowercase();
        let mentions = |needles: &[&str]| needles.iter().any(|n| indicators.contains(n));

        let has_builder = signal.links.get("github").is_some() || mentions(&["repo", "release", "launch"]);
        let academic = ["phd", "professor", "researcher", "postdoc"]
            .iter()
            .any(|s| status.contains(s));

        Self {
            phd_defense: status.contains("phd defended") || mentions(&["thesis defense", "degree completion"]),
            phd_defense_months: signal.phd_defense_months,
            left_faang: mentions(&["left big tech", "departure"]),
            new_repo: mentions(&["new github repo", "software release"]),
            conference: mentions(&["conference presentation", "public speaking"]),
            converging: signal.inflection_indicators.len() >= CONVERGING_INDICATORS,
            academic_only: !has_builder && academic,
            oss_traction: signal.github_followers.is_some_and(|f| f > OSS_FOLLOWERS) || mentions(&["pinned repos"]),
            social_active: signal.twitter_followers.is_some_and(|f| f > SOCIAL_FOLLOWERS)
                || signal.links.get("twitter").is_some(),
            already_funded: mentions_funding(&indicators) || signal.funded == Some(true),
            days_since_signal: signal.days_since_signal,
            ..Default::default()
        }
    }
}

struct Rule {
    key: &'static str,
    label: &'static str,
    points: i32,
    test: fn(&ScoringAttrs) -> bool,
}

const CONVERGING: &str = "converging";
const STALE: &str = "stale_signal";

const RUBRIC: &[Rule] = &[
    Rule {
        key: "phd_defense",
        label: "PhD defense in last 6 months",
        points: 3,
        test: |a| a.phd_defense || a.phd_defense_months.is_some_and(|m| m <= PHD_DEFENSE_WINDOW_MONTHS),
    },
    Rule {
        key: "left_faang",
        label: "Left FAANG/top lab in last 90 days",
        points: 3,
        test: |a| a.left_faang,
    },
    Rule {
        key: "new_repo",
        label: "New GitHub repo with 10+ commits",
        points: 2,
        test: |a| a.new_repo,
    },
    Rule {
        key: "conference",
        label: "Conference talk at top venue",
        points: 2,
        test: |a| a.conference,
    },
    Rule {
        key: CONVERGING,
        label: "Multiple converging signals",
        points: 2,
        test: |a| a.converging,
    },
    Rule {
        key: "venture_scale",
        label: "Venture-scale problem (TAM >$1B)",
        points: 2,
        test: |a| a.venture_scale,
    },
    Rule {
        key: "prior_startup",
        label: "Prior startup experience",
        points: 2,
        test: |a| a.prior_startup,
    },
    Rule {
        key: "oss_traction",
        label: "Open-source project with traction",
        points: 1,
        test: |a| a.oss_traction,
    },
    Rule {
        key: "social_active",
        label: "Active on social with tech focus",
        points: 1,
        test: |a| a.social_active,
    },
    Rule {
        key: "academic_only",
        label: "Academic-only pattern (no builder)",
        points: -2,
        test: |a| a.academic_only,
    },
    Rule {
        key: STALE,
        label: ">90 days since last signal",
        points: -2,
        test: |a| a.stale || a.days_since_signal.is_some_and(|d| d > STALE_AFTER_DAYS),
    },
    Rule {
        key: "already_funded",
        label: "Already funded (seed+)",
        points: -3,
        test: |a| a.already_funded,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreHit {
    pub key: &'static str,
    pub label: &'static str,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RubricScore {
    pub score: i32,
    pub strength: Band,
    pub breakdown: Vec<ScoreHit>,
}

impl RubricScore {
    fn from_hits(breakdown: Vec<ScoreHit>) -> Self {
        let score = breakdown.iter().map(|h| h.points).sum();
        Self {
            score,
            strength: Band::from_score(score),
            breakdown,
        }
    }

    fn push(&mut self, hit: ScoreHit) {
        self.score += hit.points;
        self.strength = Band::from_score(self.score);
        self.breakdown.push(hit);
    }

    /// Add a graph proximity bonus and re-band.
    pub fn apply_proximity(&mut self, proximity: &ProximityResult) {
        if proximity.bonus > 0 {
            self.push(ScoreHit {
                key: "graph_proximity",
                label: "Graph proximity to pursued prospects",
                points: proximity.bonus,
            });
        }
    }

    pub fn fired(&self, key: &str) -> bool {
        self.breakdown.iter().any(|h| h.key == key)
    }
}

fn hit(rule: &Rule) -> ScoreHit {
    ScoreHit {
        key: rule.key,
        label: rule.label,
        points: rule.points,
    }
}

/// Flat rubric score.
pub fn score(attrs: &ScoringAttrs) -> RubricScore {
    RubricScore::from_hits(RUBRIC.iter().filter(|r| (r.test)(attrs)).map(hit).collect())
}

/// Points for signal age: fresh signals gain, old ones lose.
pub fn recency_points(days: i64) -> i32 {
    match days {
        i64::MIN..=30 => 1,
        31..=90 => 0,
        91..=180 => -1,
        _ => -2,
    }
}

/// Flat rubric plus recency gradient and convergence bonus.
///
/// When the signal age is known the gradient replaces the stale rule, so an
/// old signal is penalised once. The convergence bonus needs three positive
/// rules other than `converging`, and never stacks with it.
pub fn score_extended(attrs: &ScoringAttrs) -> RubricScore {
    let gradient = attrs.days_since_signal.map(recency_points);

    let mut result = RubricScore::from_hits(
        RUBRIC
            .iter()
            .filter(|r| !(gradient.is_some() && r.key == STALE))
            .filter(|r| (r.test)(attrs))
            .map(hit)
            .collect(),
    );

    if let Some(points) = gradient.filter(|p| *p != 0) {
        result.push(ScoreHit {
            key: "recency",
            label: "Signal recency gradient",
            points,
        });
    }

    let positive = result
        .breakdown
        .iter()
        .filter(|h| h.points > 0 && h.key != CONVERGING && h.key != "recency")
        .count();
    if positive >= CONVERGENCE_MIN_RULES && !result.fired(CONVERGING) {
        result.push(ScoreHit {
            key: "convergence_bonus",
            label: "Converging signals (automatic)",
            points: CONVERGENCE_BONUS,
        });
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl Decision {
    /// `PASS - low score` style annotation used in feed and index entries.
    pub fn label(&self) -> String {
        match self.reason {
            Some(reason) => format!("{} - {reason}", self.action),
            None => self.action.to_string(),
        }
    }
}

/// Pipeline action for a scored signal.
pub fn decide_action(score: &RubricScore, thesis_fit: Option<ThesisFit>) -> Decision {
    let (action, reason) = if score.score <= 0 {
        (Action::Pass, Some("low score"))
    } else {
        match score.strength {
            Band::Strong if thesis_fit == Some(ThesisFit::Direct) => (Action::ReachOut, None),
            Band::Strong | Band::Medium => (Action::Watch, None),
            _ => (Action::Pass, Some("weak signal")),
        }
    };
    Decision { action, reason }
}

/// Scored strength to record on the signal; a pass keeps the scanner's label.
pub fn scored_strength(score: &RubricScore, reported: Option<SignalStrength>) -> Option<SignalStrength> {
    score.strength.strength().or(reported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> ScoringAttrs {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn flat_rubric_sums_rules() {
        let s = score(&attrs(json!({"phd_defense_months": 3, "new_repo": true, "left_faang": true})));
        assert_eq!(s.score, 8);
        assert_eq!(s.strength, Band::Strong);
        assert_eq!(s.breakdown.len(), 3);
    }

    #[test]
    fn synonyms_map_to_the_same_rule() {
        let s = score(&attrs(json!({"departure": true, "conference_top_venue": true, "funded": true})));
        assert_eq!(s.score, 3 + 2 - 3);
        assert!(s.fired("left_faang"));
        assert!(s.fired("already_funded"));
    }

    #[test]
    fn bands_use_canonical_thresholds() {
        assert_eq!(Band::from_score(8), Band::Strong);
        assert_eq!(Band::from_score(7), Band::Medium);
        assert_eq!(Band::from_score(4), Band::Medium);
        assert_eq!(Band::from_score(3), Band::Weak);
        assert_eq!(Band::from_score(1), Band::Weak);
        assert_eq!(Band::from_score(0), Band::Pass);
        assert_eq!(Band::from_score(-3), Band::Pass);
    }

    #[test]
    fn recency_gradient_boundaries() {
        assert_eq!(recency_points(0), 1);
        assert_eq!(recency_points(30), 1);
        assert_eq!(recency_points(31), 0);
        assert_eq!(recency_points(90), 0);
        assert_eq!(recency_points(91), -1);
        assert_eq!(recency_points(180), -1);
        assert_eq!(recency_points(181), -2);
    }

    #[test]
    fn gradient_replaces_stale_rule() {
        let a = attrs(json!({"new_repo": true, "days_since_signal": 200}));
        assert_eq!(score(&a).score, 0);
        let ext = score_extended(&a);
        assert_eq!(ext.score, 0);
        assert!(!ext.fired("stale_signal"));
        assert!(ext.fired("recency"));
    }

    #[test]
    fn convergence_bonus_needs_three_positive_rules() {
        let two = score_extended(&attrs(json!({"new_repo": true, "conference": true})));
        assert!(!two.fired("convergence_bonus"));

        let three = score_extended(&attrs(json!({"new_repo": true, "conference": true, "prior_startup": true})));
        assert!(three.fired("convergence_bonus"));
        assert_eq!(three.score, 2 + 2 + 2 + 2);
        assert_eq!(three.strength, Band::Strong);
    }

    #[test]
    fn convergence_bonus_does_not_stack_with_manual_flag() {
        let s = score_extended(&attrs(json!({
            "new_repo": true, "conference": true, "prior_startup": true, "multiple_signals": true
        })));
        assert!(s.fired("converging"));
        assert!(!s.fired("convergence_bonus"));
        assert_eq!(s.score, 8);
    }

    #[test]
    fn proximity_bonus_rebands() {
        let mut s = score(&attrs(json!({"new_repo": true, "conference": true, "social_active": true})));
        assert_eq!(s.strength, Band::Medium);
        s.apply_proximity(&ProximityResult {
            bonus: 3,
            raw: 12.5,
            paths: 2,
            explanation: String::new(),
            contributors: Vec::new(),
        });
        assert_eq!(s.score, 8);
        assert_eq!(s.strength, Band::Strong);
    }

    #[test]
    fn action_decisions() {
        let strong = score(&attrs(json!({"phd_defense": true, "left_faang": true, "new_repo": true})));
        assert_eq!(decide_action(&strong, Some(ThesisFit::Direct)).action, Action::ReachOut);
        assert_eq!(decide_action(&strong, Some(ThesisFit::Adjacent)).action, Action::Watch);

        let weak = score(&attrs(json!({"oss_traction": true})));
        let d = decide_action(&weak, None);
        assert_eq!(d.label(), "PASS - weak signal");

        let negative = score(&attrs(json!({"academic_only": true})));
        assert_eq!(decide_action(&negative, None).label(), "PASS - low score");
    }

    #[test]
    fn attributes_from_scanner_record() {
        let record: SignalRecord = serde_json::from_value(json!({
            "name": "Jane Doe",
            "status": "PhD researcher",
            "inflection_indicators": ["Thesis defense scheduled", "conference presentation at NeurIPS", "new GitHub repo"],
            "_github_followers": 240,
            "days_since_signal": 12
        }))
        .unwrap();
        let a = ScoringAttrs::from_signal(&record);
        assert!(a.phd_defense);
        assert!(a.conference);
        assert!(a.new_repo);
        assert!(a.converging);
        assert!(a.oss_traction);
        assert!(!a.academic_only, "repo indicator counts as builder evidence");
        assert!(!a.already_funded);
        assert_eq!(a.days_since_signal, Some(12));

        let academic: SignalRecord =
            serde_json::from_value(json!({"name": "Ada Smith", "status": "Postdoc"})).unwrap();
        assert!(ScoringAttrs::from_signal(&academic).academic_only);
    }

    #[test]
    fn negated_funding_mentions_do_not_count() {
        let funded = |indicators: serde_json::Value| {
            let record: SignalRecord =
                serde_json::from_value(json!({"name": "Jane Doe", "inflection_indicators": indicators})).unwrap();
            ScoringAttrs::from_signal(&record).already_funded
        };
        assert!(funded(json!(["Funded by a16z"])));
        assert!(funded(json!(["seed round, venture-funded"])));
        assert!(!funded(json!(["Unfunded side project"])));
        assert!(!funded(json!(["not funded", "not yet funded"])));
        assert!(!funded(json!(["refunded conference fee"])));
    }
}
