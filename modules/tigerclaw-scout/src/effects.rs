//! Opt-in side effects of a ripple run: feed entries, operator suggestions
//! and graph audit edges.

use serde::Serialize;
use tracing::{info, warn};

use tigerclaw_graph::{record_audit, GraphStore, RippleReport, RippleTarget, Verdict};

use crate::feed::{DiscoveryFeed, FeedEntry, FeedStatus, Suggestion, SuggestionLog};

#[derive(Default)]
pub struct RippleEffects<'a> {
    pub feed: Option<&'a DiscoveryFeed>,
    pub suggestions: Option<&'a SuggestionLog>,
    pub audit: Option<&'a dyn GraphStore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectsSummary {
    pub feed_entries: usize,
    pub suggestions: usize,
    pub audit_edges: usize,
}

pub fn feed_entry(report: &RippleReport, target: &RippleTarget) -> Option<FeedEntry> {
    let detail = format!(
        "RIPPLE from {} ({}) — score {}",
        report.trigger_name, report.event_label, target.score
    );
    match target.verdict {
        Verdict::Escalate => Some(FeedEntry::new(FeedStatus::Found, &target.name, detail).with_strength("STRONG")),
        Verdict::Review => Some(FeedEntry::new(FeedStatus::Watching, &target.name, detail)),
        Verdict::Note => None,
    }
}

pub async fn apply(report: &RippleReport, effects: RippleEffects<'_>) -> EffectsSummary {
    let mut summary = EffectsSummary::default();

    if let Some(feed) = effects.feed {
        for entry in report.results.iter().filter_map(|t| feed_entry(report, t)) {
            feed.emit(entry);
            summary.feed_entries += 1;
        }
    }

    if let Some(log) = effects.suggestions {
        let suggestions: Vec<Suggestion> = report
            .with_verdict(Verdict::Escalate)
            .map(|t| Suggestion::escalation(report, t))
            .collect();
        match log.append(&suggestions).await {
            Ok(n) => summary.suggestions = n,
            Err(e) => warn!(error = %e, "Failed to write ripple suggestions"),
        }
    }

    if let Some(store) = effects.audit {
        summary.audit_edges = record_audit(store, report).await;
    }

    info!(
        trigger = %report.trigger,
        feed = summary.feed_entries,
        suggestions = summary.suggestions,
        audit = summary.audit_edges,
        "Ripple effects applied"
    );
    summary
}
