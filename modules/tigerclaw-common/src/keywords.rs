//! Stopword lists and the keyword extractors shared by merge, theme
//! classification, orphan clustering and theme adjacency.

use std::collections::BTreeSet;

pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "for", "to", "in", "of", "and", "or", "via", "based", "as", "by", "with",
    "from", "per", "non", "new", "hot", "cold", "low", "high", "using", "replacing", "enabling",
];

/// Words too generic to characterize someone's work.
pub const WORK_STOPWORDS: &[&str] = &[
    "research", "study", "paper", "novel", "approach", "method", "system", "framework", "tool",
    "project", "work", "building", "developing", "analysis", "design", "implementation",
    "application", "model", "data", "learning", "deep", "machine", "neural", "network",
    "university", "professor", "student", "phd", "lab", "group", "first", "author", "published",
    "conference",
];

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Matching vocabulary of a theme title: words longer than two characters
/// that are not stopwords, in order of appearance, deduplicated.
pub fn theme_keywords(title: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tokens(title)
        .filter(|t| t.chars().count() > 2 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Characteristic words of a work description: longer than three
/// characters, not a stopword or a generic work word.
pub fn work_keywords(text: &str) -> BTreeSet<String> {
    tokens(text)
        .filter(|t| t.chars().count() > 3)
        .filter(|t| !STOPWORDS.contains(&t.as_str()) && !WORK_STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Significant words of a theme primitive, used to derive adjacency.
pub fn significant_words(text: &str) -> BTreeSet<String> {
    tokens(text)
        .filter(|t| t.chars().count() > 3 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_keywords_drop_stopwords_and_short_words() {
        assert_eq!(
            theme_keywords("Memory tiering for AI inference via CXL"),
            vec!["memory", "tiering", "inference", "cxl"]
        );
    }

    #[test]
    fn theme_keywords_dedupe_preserving_order() {
        assert_eq!(theme_keywords("Quantum sensing, quantum networks"), vec!["quantum", "sensing", "networks"]);
    }

    #[test]
    fn work_keywords_drop_generic_research_words() {
        let kws = work_keywords("Novel framework for photonic interconnect research at MIT lab");
        assert_eq!(
            kws.into_iter().collect::<Vec<_>>(),
            vec!["interconnect".to_string(), "photonic".to_string()]
        );
    }

    #[test]
    fn significant_words_keep_domain_words() {
        let words = significant_words("Optical interconnects for AI data centers");
        assert!(words.contains("optical"));
        assert!(words.contains("data"));
        assert!(!words.contains("for"));
    }
}
