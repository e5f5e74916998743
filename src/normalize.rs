//! Title Normalization Module
//!
//! Provides functions to:
//! - Reduce a scholarship title to the words that actually identify it
//! - Build SEO-friendly slugs for the CSV `Slug` column
//!
//! Both strip academic years (2020-2039, with optional `/26`, `-40` or `-2026`
//! style suffixes) because the same programme is re-posted every cycle.

use lazy_static::lazy_static;
use regex::Regex;

/// Words that never distinguish one scholarship from another.
const FILLER_WORDS: &[&str] = &[
    "fully funded",
    "apply now",
    "scholarships",
    "scholarship",
    "funded",
    "full",
    "free",
    "the",
    "for",
    "in",
    "at",
];

/// Promotional phrases dropped from slugs.
const MARKETING_WORDS: &[&str] = &[
    "apply now", "fully funded", "full funding", "free", "no fee", "deadline",
    "hurry up", "limited time", "don't miss", "opportunity", "chance",
    "amazing", "exclusive", "special", "urgent", "last call", "final",
    "best", "top", "premium", "guaranteed", "easy", "quick", "fast",
];

/// Generic words with no value in a URL.
const SLUG_GENERIC_WORDS: &[&str] = &["program", "opportunity", "application"];

const MAX_SLUG_LEN: usize = 100;

lazy_static! {
    static ref YEAR_RE: Regex =
        Regex::new(r"\b20[23][0-9](?:[/-](?:20)?\d{2})?\b").unwrap();
    static ref FILLER_RE: Regex = word_list_regex(FILLER_WORDS);
    static ref MARKETING_RE: Regex = word_list_regex(MARKETING_WORDS);
    static ref SLUG_GENERIC_RE: Regex = word_list_regex(SLUG_GENERIC_WORDS);
    static ref PARENTHETICAL_RE: Regex = Regex::new(r"\([^)]*\)").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_SLUG_CHARS_RE: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SLUG_SEPARATOR_RE: Regex = Regex::new(r"[\s-]+").unwrap();
}

/// Whole-word alternation, longest phrases first.
fn word_list_regex(words: &[&str]) -> Regex {
    let mut words: Vec<&str> = words.to_vec();
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation)).unwrap()
}

/// Normalize a title for duplicate comparison.
///
/// The result is lowercase, has no year tokens, filler words or
/// parenthetical asides, and single spaces between words. Passes are
/// repeated until nothing changes, so normalizing twice gives the same
/// string as normalizing once.
pub fn normalize_title(title: &str) -> String {
    let mut current = normalize_title_pass(title);
    loop {
        let next = normalize_title_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_title_pass(title: &str) -> String {
    let lowered = title.to_lowercase();
    let no_years = YEAR_RE.replace_all(&lowered, " ");
    let no_filler = FILLER_RE.replace_all(&no_years, " ");
    let no_asides = PARENTHETICAL_RE.replace_all(&no_filler, " ");
    WHITESPACE_RE.replace_all(&no_asides, " ").trim().to_string()
}

/// Generate an SEO-friendly slug from a scholarship title.
///
/// Empty titles give an empty slug; titles that reduce to nothing give
/// `"scholarship"`.
pub fn generate_slug(title: &str) -> String {
    if title.trim().is_empty() {
        return String::new();
    }

    let lowered = title.to_lowercase();
    let slug = YEAR_RE.replace_all(&lowered, "");
    let slug = MARKETING_RE.replace_all(&slug, "");
    let slug = SLUG_GENERIC_RE.replace_all(&slug, "");
    let slug = NON_SLUG_CHARS_RE.replace_all(&slug, "");
    let slug = SLUG_SEPARATOR_RE.replace_all(&slug, "-");
    let mut slug = slug.trim_matches('-').to_string();

    if slug.chars().count() > MAX_SLUG_LEN {
        let truncated: String = slug.chars().take(MAX_SLUG_LEN).collect();
        // cut at a word boundary when one exists far enough in
        slug = match truncated.rfind('-') {
            Some(pos) if truncated[..pos].chars().count() > 50 => truncated[..pos].to_string(),
            _ => truncated,
        };
    }

    if slug.is_empty() {
        "scholarship".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title_strips_years_and_filler() {
        assert_eq!(
            normalize_title("DAAD Scholarship in Germany 2025 (Fully Funded)"),
            "daad germany"
        );
        assert_eq!(
            normalize_title("Fully Funded DAAD Germany Scholarship (Apply Now)"),
            "daad germany"
        );
    }

    #[test]
    fn test_normalize_title_year_ranges() {
        let normalized = normalize_title("DAAD Scholarship 2025/26 in Germany");
        assert_eq!(normalized, "daad germany");
        assert!(!normalized.chars().any(|c| c.is_ascii_digit()));

        assert_eq!(normalize_title("Chevening 2026-2027 Awards"), "chevening awards");
        // a range may end past the 2020-2039 window
        assert_eq!(normalize_title("Commonwealth Award 2039-40"), "commonwealth award");
        assert_eq!(normalize_title("Commonwealth Award 2039/2040"), "commonwealth award");
        // outside the 2020-2039 window
        assert_eq!(normalize_title("Class of 2019 Award"), "class of 2019 award");
    }

    #[test]
    fn test_normalize_title_whole_words_only() {
        // "in" and "at" must not be cut out of longer words
        assert_eq!(
            normalize_title("Finland Government Scholarship at Aalto"),
            "finland government aalto"
        );
        assert_eq!(normalize_title("Erasmus Mundus Scholarship 2025 in France"), "erasmus mundus france");
    }

    #[test]
    fn test_normalize_title_empty() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("Scholarship 2025 (Fully Funded)"), "");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_normalize_title_is_stable() {
        let titles = [
            "The Apply (x) Now Scholarship",
            "Full Scholarship for the 2025/26 intake (Funded) at MIT",
            "Stipendium Hungaricum   Scholarship 2030",
        ];
        for title in titles {
            let once = normalize_title(title);
            assert_eq!(normalize_title(&once), once, "{}", title);
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(
            generate_slug("DAAD Scholarship in Germany 2025 (Fully Funded)"),
            "daad-scholarship-in-germany"
        );
        assert_eq!(
            generate_slug("Apply Now: Best Research Program 2024/25!"),
            "research"
        );
    }

    #[test]
    fn test_generate_slug_edge_cases() {
        assert_eq!(generate_slug(""), "");
        assert_eq!(generate_slug("Apply Now!!!"), "scholarship");

        let long = "word ".repeat(40);
        let slug = generate_slug(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
        assert!(slug.starts_with("word-word"));
    }
}
