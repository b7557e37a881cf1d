// Heading slugs for requirements anchors.
//
// Slugs: lowercase, whitespace runs become hyphens, anything outside
// [a-z0-9_-] is dropped, hyphen runs collapse. Leading and trailing hyphens
// are kept so anchors match the ones browsers already bookmarked.

use std::collections::HashMap;

/// Convert a heading string into an anchor slug.
///
/// Returns an empty string when nothing survives the filtering.
pub fn slugify(heading: &str) -> String {
    let lowered = heading.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            slug.push(ch);
        }
    }

    collapse_hyphens(&slug)
}

fn collapse_hyphens(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out
}

/// Hands out unique anchors for a document, suffixing repeats with
/// `-2`, `-3`, ….
#[derive(Debug, Default)]
pub struct SlugRegistry {
    seen: HashMap<String, usize>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(&mut self, heading: &str) -> String {
        let base = slugify(heading);
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        disambiguate(&base, *count)
    }
}

/// Append an ordinal suffix to a slug.
///
/// Returns `base` unchanged when `occurrence <= 1`.
pub fn disambiguate(base: &str, occurrence: usize) -> String {
    if occurrence <= 1 {
        base.to_string()
    } else {
        format!("{base}-{occurrence}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── slugify ──────────────────────────────────────────────────────

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Business Requirements"), "business-requirements");
    }

    #[test]
    fn slugify_drops_punctuation() {
        assert_eq!(slugify("1. Introduction & Scope"), "1-introduction-scope");
        assert_eq!(slugify("API: Authentication (v2)"), "api-authentication-v2");
    }

    #[test]
    fn slugify_keeps_underscores_and_edge_hyphens() {
        assert_eq!(slugify("CUST_ID field"), "cust_id-field");
        assert_eq!(slugify(" padded "), "-padded-");
    }

    #[test]
    fn slugify_collapses_hyphen_runs() {
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("a---b"), "a-b");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Über Cool"), "ber-cool");
        assert_eq!(slugify("日本語"), "");
    }

    // ── registry ─────────────────────────────────────────────────────

    #[test]
    fn repeated_headings_get_numbered() {
        let mut registry = SlugRegistry::new();
        assert_eq!(registry.unique("Overview"), "overview");
        assert_eq!(registry.unique("Details"), "details");
        assert_eq!(registry.unique("Overview"), "overview-2");
        assert_eq!(registry.unique("overview"), "overview-3");
    }

    #[test]
    fn disambiguate_first_occurrence_unchanged() {
        assert_eq!(disambiguate("scope", 1), "scope");
        assert_eq!(disambiguate("scope", 4), "scope-4");
    }
}
