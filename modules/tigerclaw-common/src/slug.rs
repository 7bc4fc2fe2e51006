use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a display name into a node key: lowercase, diacritics stripped,
/// runs of anything outside `[a-z0-9]` collapsed to a single hyphen, no
/// leading or trailing hyphen.
///
/// A slug is a lookup convenience. Two different people can share one.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_name_becomes_hyphenated_lowercase() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
    }

    #[test]
    fn diacritics_are_stripped() {
        assert_eq!(slugify("José Núñez"), "jose-nunez");
        assert_eq!(slugify("Zoë Müller-Lüdenscheidt"), "zoe-muller-ludenscheidt");
    }

    #[test]
    fn punctuation_and_whitespace_collapse() {
        assert_eq!(slugify("  Dr. Wei   Liu, PhD "), "dr-wei-liu-phd");
    }

    #[test]
    fn nothing_sluggable_yields_empty() {
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slugify_is_idempotent() {
        let once = slugify("Ana-María O'Neil");
        assert_eq!(slugify(&once), once);
    }
}
