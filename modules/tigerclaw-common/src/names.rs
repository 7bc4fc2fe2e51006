//! Heuristic filter deciding whether a scanner-provided string plausibly
//! names a person. Scanners emit placeholder strings, URLs, handles and lab
//! acronyms in the name slot; none of those may become graph nodes.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const MIN_CHARS: usize = 2;
const MAX_CHARS: usize = 100;

/// Placeholder strings scanners emit when no author is known (compared
/// case-insensitively against the whole trimmed name).
const PLACEHOLDERS: &[&str] = &[
    "anonymous", "unknown", "n/a", "na", "none", "null", "undefined", "admin", "user", "test",
    "root", "guest", "bot", "system",
];

/// Whole-string reject patterns, checked in order.
static REJECT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^\d+$").unwrap(), "pure number"),
        (Regex::new(r"(?i)^https?://").unwrap(), "url"),
        (Regex::new(r"^[A-Za-z0-9._%+-]+@").unwrap(), "email address"),
        (Regex::new(r"^@").unwrap(), "social handle"),
        (Regex::new(r"^[A-Z]{2,5}$").unwrap(), "short acronym"),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRejection {
    Empty,
    TooShort,
    TooLong,
    NoLetters,
    Placeholder,
    Pattern(&'static str),
    /// A multi-token name with a token that does not start uppercase.
    Casing(String),
}

impl fmt::Display for NameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRejection::Empty => write!(f, "empty name"),
            NameRejection::TooShort => write!(f, "shorter than {MIN_CHARS} characters"),
            NameRejection::TooLong => write!(f, "longer than {MAX_CHARS} characters"),
            NameRejection::NoLetters => write!(f, "contains no letters"),
            NameRejection::Placeholder => write!(f, "placeholder name"),
            NameRejection::Pattern(what) => write!(f, "looks like a {what}"),
            NameRejection::Casing(token) => write!(f, "token '{token}' is not capitalized"),
        }
    }
}

/// Check a candidate name, reporting the first rule it fails.
pub fn check_person_name(name: &str) -> Result<(), NameRejection> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NameRejection::Empty);
    }

    let chars = trimmed.chars().count();
    if chars < MIN_CHARS {
        return Err(NameRejection::TooShort);
    }
    if chars > MAX_CHARS {
        return Err(NameRejection::TooLong);
    }

    let lowered = trimmed.to_lowercase();
    if PLACEHOLDERS.contains(&lowered.as_str()) {
        return Err(NameRejection::Placeholder);
    }

    for (pattern, what) in REJECT_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            return Err(NameRejection::Pattern(what));
        }
    }

    if !trimmed.chars().any(char::is_alphabetic) {
        return Err(NameRejection::NoLetters);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() > 1 {
        for token in &tokens {
            let starts_upper = token.chars().next().is_some_and(char::is_uppercase);
            if !starts_upper {
                return Err(NameRejection::Casing(token.to_string()));
            }
        }
    }

    Ok(())
}

pub fn is_likely_person_name(name: &str) -> bool {
    check_person_name(name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_pass() {
        assert!(is_likely_person_name("Jane Doe"));
        assert!(is_likely_person_name("Wei Liu"));
        assert!(is_likely_person_name("José Núñez"));
        assert!(is_likely_person_name("Mary-Kate O'Brien"));
    }

    #[test]
    fn mononyms_pass() {
        assert!(is_likely_person_name("Madonna"));
    }

    #[test]
    fn placeholders_rejected_case_insensitively() {
        assert_eq!(check_person_name("Anonymous"), Err(NameRejection::Placeholder));
        assert_eq!(check_person_name("N/A"), Err(NameRejection::Placeholder));
        assert_eq!(check_person_name("  unknown "), Err(NameRejection::Placeholder));
    }

    #[test]
    fn length_bounds() {
        assert_eq!(check_person_name(""), Err(NameRejection::Empty));
        assert_eq!(check_person_name("   "), Err(NameRejection::Empty));
        assert_eq!(check_person_name("J"), Err(NameRejection::TooShort));
        assert_eq!(check_person_name(&"A".repeat(101)), Err(NameRejection::TooLong));
    }

    #[test]
    fn urls_emails_handles_rejected() {
        assert_eq!(
            check_person_name("https://arxiv.org/abs/2401.00001"),
            Err(NameRejection::Pattern("url"))
        );
        assert_eq!(
            check_person_name("jane.doe@mit.edu"),
            Err(NameRejection::Pattern("email address"))
        );
        assert_eq!(check_person_name("@janedoe"), Err(NameRejection::Pattern("social handle")));
    }

    #[test]
    fn numbers_and_symbols_rejected() {
        assert_eq!(check_person_name("12345"), Err(NameRejection::Pattern("pure number")));
        assert_eq!(check_person_name("--- ***"), Err(NameRejection::NoLetters));
    }

    #[test]
    fn short_all_caps_single_token_is_an_acronym() {
        assert_eq!(check_person_name("CSAIL"), Err(NameRejection::Pattern("short acronym")));
        assert_eq!(check_person_name("MIT"), Err(NameRejection::Pattern("short acronym")));
        // Six letters is past the acronym window.
        assert!(is_likely_person_name("NVIDIA"));
    }

    #[test]
    fn every_token_of_a_multi_token_name_must_be_capitalized() {
        assert_eq!(
            check_person_name("jane doe"),
            Err(NameRejection::Casing("jane".to_string()))
        );
        assert_eq!(
            check_person_name("Jane van Berg"),
            Err(NameRejection::Casing("van".to_string()))
        );
        assert!(check_person_name("deep learning team").is_err());
    }
}
