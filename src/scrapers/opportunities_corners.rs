//! OpportunitiesCorners posts rarely use heading sections, so each field
//! has its own fallback chain: explicit label, then the title, then a
//! pattern search over the body text.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html};

use super::common::{
    extract_section, find_image, find_official_link, select_preferred, select_within, text_of,
};
use crate::normalize::generate_slug;
use crate::types::Scholarship;

pub const NO_DEADLINE: &str = "Deadline not specified";

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december";

/// Needle as it appears in lowercase text, and how to print it.
const COUNTRIES: &[(&str, &str)] = &[
    ("germany", "Germany"),
    ("italy", "Italy"),
    ("france", "France"),
    ("spain", "Spain"),
    ("uk", "UK"),
    ("united kingdom", "United Kingdom"),
    ("netherlands", "Netherlands"),
    ("belgium", "Belgium"),
    ("sweden", "Sweden"),
    ("norway", "Norway"),
    ("finland", "Finland"),
    ("denmark", "Denmark"),
    ("switzerland", "Switzerland"),
    ("austria", "Austria"),
    ("ireland", "Ireland"),
    ("poland", "Poland"),
    ("portugal", "Portugal"),
    ("czech republic", "Czech Republic"),
    ("greece", "Greece"),
    ("hungary", "Hungary"),
    ("malta", "Malta"),
    ("turkey", "Turkey"),
    ("romania", "Romania"),
    ("estonia", "Estonia"),
    ("europe", "Europe"),
];

/// Typical length of each degree level, used when the post gives none.
const DEGREE_DURATIONS: &[(&str, &str)] = &[
    ("bachelor", "3-4 years"),
    ("undergraduate", "3-4 years"),
    ("master", "1-2 years"),
    ("postgraduate", "1-2 years"),
    ("msc", "1-2 years"),
    ("ma", "1-2 years"),
    ("mba", "1-2 years"),
    ("phd", "3-5 years"),
    ("doctorate", "3-5 years"),
];

const DEGREE_NAMES: &[(&str, &str)] = &[
    ("bachelor", "Bachelor's Degree"),
    ("undergraduate", "Bachelor's Degree"),
    ("master", "Master's Degree"),
    ("msc", "Master of Science"),
    ("ma", "Master of Arts"),
    ("mba", "Master of Business Administration"),
    ("phd", "PhD/Doctorate"),
    ("doctorate", "PhD/Doctorate"),
];

lazy_static! {
    static ref DATE_NEAR_DEADLINE_RE: Regex = Regex::new(&format!(
        r"(?i)(?:deadline|applications?\s+close)[^.]*?(\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{}),?\s+20\d{{2}})",
        MONTHS
    ))
    .unwrap();
    static ref TITLE_IN_PLACE_RE: Regex =
        Regex::new(r"\bin\s+([a-z][a-z\s]*?)(?:\s*\(|,|\s+20\d{2}|$)").unwrap();
    static ref COUNTRY_RE: Regex = {
        let mut needles: Vec<&str> = COUNTRIES.iter().map(|(n, _)| *n).collect();
        needles.sort_by_key(|n| std::cmp::Reverse(n.len()));
        Regex::new(&format!(r"\b(?:{})\b", needles.join("|"))).unwrap()
    };
    static ref CONTENT_UNIVERSITY_RE: Regex = Regex::new(
        r"\b(?:University\s+of(?:\s+[A-Z][\w'-]*)+|(?:[A-Z][\w'-]*\s+)+University)\b"
    )
    .unwrap();
    static ref DURATION_RANGE_RE: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s+to\s+(\d+(?:\.\d+)?)\s+years?").unwrap();
    static ref DURATION_RE: Regex = Regex::new(
        r"(?:duration|program)(?:\s+is|\s+will\s+be|\s+of)?\s*:?\s*(\d+(?:\.\d+)?)\s+(year|month)s?"
    )
    .unwrap();
    static ref YEAR_PROGRAM_RE: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s*-?\s*year\s+(?:program|course|degree)").unwrap();
    static ref DURATION_BY_DEGREE: Vec<(Regex, &'static str)> = word_patterns(DEGREE_DURATIONS);
    static ref DEGREE_BY_KEYWORD: Vec<(Regex, &'static str)> = word_patterns(DEGREE_NAMES);
    static ref CONTENT_DEGREE_RE: Regex = Regex::new(
        r"bachelor(?:'s)?(?:\s+of\s+[a-z]+)?(?:\s+degree)?|master(?:'s)?(?:\s+of\s+[a-z]+)?(?:\s+degree)?|\bph\.?d\b\.?|doctorate"
    )
    .unwrap();
}

/// Whole word, optionally pluralised or possessive (`master's`, `masters`).
fn word_pattern(word: &str) -> Regex {
    Regex::new(&format!(r"\b{}(?:'?s)?\b", regex::escape(word))).unwrap()
}

fn word_patterns(table: &'static [(&'static str, &'static str)]) -> Vec<(Regex, &'static str)> {
    table.iter().map(|(word, value)| (word_pattern(word), *value)).collect()
}

fn country_display(needle: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|(n, _)| *n == needle)
        .map(|(_, display)| *display)
}

/// Value of a `Label: value` field: the next sibling element, or the text
/// after the colon in the label's parent.
fn label_value(label: ElementRef) -> Option<String> {
    if let Some(next) = label.next_siblings().find_map(ElementRef::wrap) {
        return Some(text_of(next));
    }
    let parent = label.parent().and_then(ElementRef::wrap)?;
    let text = text_of(parent);
    text.split_once(':').map(|(_, value)| value.trim().to_string())
}

fn labelled(content: ElementRef, keywords: &[&str]) -> Option<String> {
    select_within(content, "h2, h3, h4, strong, b")
        .into_iter()
        .find(|tag| {
            let label = text_of(*tag).to_lowercase();
            keywords.iter().any(|k| label.contains(k))
        })
        .and_then(label_value)
        .filter(|v| !v.is_empty())
}

pub fn extract_deadline(content: ElementRef) -> String {
    for tag in select_within(content, "strong, b") {
        if text_of(tag).to_lowercase().contains("deadline") {
            if let Some(parent) = tag.parent().and_then(ElementRef::wrap) {
                return text_of(parent);
            }
        }
    }

    for tag in select_within(content, "p, li") {
        let text = text_of(tag);
        if let Some((_, rest)) = text.split_once("eadline") {
            return format!("Deadline: {}", rest.trim_start_matches([':', ' ']).trim());
        }
    }

    for tag in select_within(content, "h2, h3, h4") {
        let text = text_of(tag);
        if text.to_lowercase().contains("deadline") {
            return text;
        }
    }

    let body = text_of(content);
    if let Some(caps) = DATE_NEAR_DEADLINE_RE.captures(&body) {
        return format!("Deadline: {}", &caps[1]);
    }

    NO_DEADLINE.to_string()
}

/// First few substantial paragraphs, stopping at the first labelled section.
pub fn extract_description(content: ElementRef) -> String {
    const SECTION_WORDS: &[&str] = &["eligibility", "deadline", "host", "country", "university", "duration"];
    const LABELS: &[&str] = &["eligibility:", "deadline:", "host country:", "university:", "duration:"];

    let mut parts: Vec<String> = Vec::new();
    for p in select_within(content, "p") {
        let text = text_of(p);
        let lower = text.to_lowercase();

        let has_label = !select_within(p, "strong, b").is_empty();
        if has_label && !parts.is_empty() && SECTION_WORDS.iter().any(|w| lower.contains(w)) {
            break;
        }

        if text.chars().count() > 30 && !LABELS.iter().any(|l| lower.contains(l)) {
            parts.push(text);
            if parts.iter().map(|p| p.len() + 1).sum::<usize>() > 300 {
                break;
            }
        }
    }
    parts.join("\n")
}

pub fn extract_host_country(content: ElementRef, title: &str) -> String {
    if let Some(value) = labelled(content, &["host country", "country of study", "country:"]) {
        return value;
    }

    let title_lower = title.to_lowercase();
    if let Some(caps) = TITLE_IN_PLACE_RE.captures(&title_lower) {
        if let Some(display) = country_display(caps[1].trim()) {
            return display.to_string();
        }
    }
    if let Some(m) = COUNTRY_RE.find(&title_lower) {
        if let Some(display) = country_display(m.as_str()) {
            return display.to_string();
        }
    }

    let body = text_of(content).to_lowercase();
    for (needle, display) in COUNTRIES {
        if body.contains(&format!("country: {}", needle)) {
            return display.to_string();
        }
    }

    String::new()
}

/// University phrase in a title such as "Oxford University Clarendon Fund".
fn university_from_title(title: &str) -> Option<String> {
    const KEYWORDS: &[&str] = &["university", "college", "institute", "school"];
    const CONNECTORS: &[&str] = &["of", "for", "and", "the"];
    const SKIP: &[&str] = &["scholarship", "scholarships", "fully", "funded"];

    let words: Vec<&str> = title.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let mut name = Vec::new();
    let mut found = false;
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if KEYWORDS.contains(&lower.as_str()) {
            found = true;
            name.push(*word);
        } else if found && (CONNECTORS.contains(&lower.as_str()) || i < 5) {
            name.push(*word);
        } else if !found && i < 3 && !SKIP.contains(&lower.as_str()) {
            name.push(*word);
        } else if found {
            break;
        }
    }

    found.then(|| name.join(" "))
}

pub fn extract_host_university(content: ElementRef, title: &str) -> String {
    if let Some(value) = labelled(content, &["host university", "university:", "offered by"]) {
        return value;
    }
    if let Some(name) = university_from_title(title) {
        return name;
    }

    let body = text_of(content);
    CONTENT_UNIVERSITY_RE
        .find_iter(&body)
        .map(|m| m.as_str().trim())
        .find(|m| {
            let lower = m.to_lowercase();
            !lower.contains("apply") && !lower.contains("eligible")
        })
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn extract_program_duration(content: ElementRef) -> String {
    if let Some(value) = labelled(
        content,
        &["program duration", "duration:", "course duration", "length of study"],
    ) {
        return value;
    }

    let body = text_of(content).to_lowercase();
    if let Some(caps) = DURATION_RANGE_RE.captures(&body) {
        return format!("{} to {} years", &caps[1], &caps[2]);
    }
    if let Some(caps) = DURATION_RE.captures(&body) {
        return format!("{} {}s", &caps[1], &caps[2]);
    }
    if let Some(caps) = YEAR_PROGRAM_RE.captures(&body) {
        return format!("{} years", &caps[1]);
    }

    DURATION_BY_DEGREE
        .iter()
        .find(|(level, _)| level.is_match(&body))
        .map(|(_, duration)| duration.to_string())
        .unwrap_or_default()
}

pub fn extract_degree_offered(content: ElementRef, title: &str) -> String {
    if let Some(value) = labelled(
        content,
        &["degree offered", "degree", "field of study", "what you will study"],
    ) {
        return value;
    }

    let title_lower = title.to_lowercase();
    if let Some((_, name)) = DEGREE_BY_KEYWORD.iter().find(|(k, _)| k.is_match(&title_lower)) {
        return name.to_string();
    }

    let body = text_of(content).to_lowercase();
    CONTENT_DEGREE_RE
        .find(&body)
        .map(|m| capitalize(m.as_str()))
        .unwrap_or_default()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_scholarship_image(url: &str) -> bool {
    const AD_DOMAINS: &[&str] = &["ezodn.com", "ezcdn.com", "doubleclick.net", "google.com"];
    const INDICATORS: &[&str] = &["wp-content/uploads", "scholarship", "study", "university", "education"];

    let url = url.to_lowercase();
    !AD_DOMAINS.iter().any(|d| url.contains(d)) && INDICATORS.iter().any(|i| url.contains(i))
}

/// Parse an OpportunitiesCorners post. `None` when the page has no title
/// or no content area.
pub fn parse_post(html: &str, link: &str, region: &str, today: NaiveDate) -> Option<Scholarship> {
    let document = Html::parse_document(html);

    let title = select_preferred(&document, &["h1.entry-title", "h1.post-title", "h1"])
        .map(text_of)
        .filter(|t| !t.is_empty())?;
    let content = select_preferred(
        &document,
        &["div.entry-content", "div.post-content", "article", "div.post"],
    )?;

    let post_at = select_preferred(&document, &[".entry-date.published", ".post-date", ".date", "time"])
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());

    Some(Scholarship {
        slug: generate_slug(&title),
        description: extract_description(content),
        link: link.to_string(),
        official_link: find_official_link(content, &["official", "apply"]),
        image: find_image(&document, Some(content), link, is_scholarship_image),
        deadline: extract_deadline(content),
        eligibility: extract_section(content, &["eligibility", "who can apply", "eligible"]),
        host_country: extract_host_country(content, &title),
        host_university: extract_host_university(content, &title),
        program_duration: extract_program_duration(content),
        degree_offered: extract_degree_offered(content, &title),
        region: region.to_string(),
        post_at,
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::common::select_first;

    fn content_of(html: &str) -> Html {
        Html::parse_document(&format!("<div class=\"entry-content\">{}</div>", html))
    }

    fn with_content<T>(html: &str, f: impl FnOnce(ElementRef) -> T) -> T {
        let document = content_of(html);
        let content = select_first(&document, "div.entry-content").unwrap();
        f(content)
    }

    #[test]
    fn test_deadline_from_strong_label() {
        let deadline = with_content(
            "<p><strong>Deadline:</strong> 31st May 2025</p>",
            extract_deadline,
        );
        assert_eq!(deadline, "Deadline: 31st May 2025");
    }

    #[test]
    fn test_deadline_from_paragraph_and_default() {
        let deadline = with_content(
            "<p>Intro text.</p><p>The application deadline is 1 March 2026</p>",
            extract_deadline,
        );
        assert_eq!(deadline, "Deadline: is 1 March 2026");

        assert_eq!(with_content("<p>No dates here.</p>", extract_deadline), NO_DEADLINE);
    }

    #[test]
    fn test_host_country_sources() {
        let labelled = with_content("<p><strong>Host Country:</strong> Sweden</p>", |c| {
            extract_host_country(c, "Some Award")
        });
        assert_eq!(labelled, "Sweden");

        let from_title = with_content("<p>Text</p>", |c| {
            extract_host_country(c, "Erasmus Mundus Scholarship in United Kingdom 2025")
        });
        assert_eq!(from_title, "United Kingdom");

        let mention = with_content("<p>Text</p>", |c| extract_host_country(c, "UK Government Chevening Award"));
        assert_eq!(mention, "UK");

        // "finland" must not match inside other words
        let none = with_content("<p>Text</p>", |c| extract_host_country(c, "Finlandia Prize"));
        assert_eq!(none, "");
    }

    #[test]
    fn test_host_university_sources() {
        let labelled = with_content("<p><b>Host University:</b> Lund University</p>", |c| {
            extract_host_university(c, "Global Scholarship Programme")
        });
        assert_eq!(labelled, "Lund University");

        let from_title = with_content("<p>Text</p>", |c| {
            extract_host_university(c, "University of Edinburgh Global Research Scholarship")
        });
        assert_eq!(from_title, "University of Edinburgh Global Research");

        let from_body = with_content(
            "<p>Fully funded places at the University of Twente for international students.</p>",
            |c| extract_host_university(c, "Excellence Award"),
        );
        assert_eq!(from_body, "University of Twente");
    }

    #[test]
    fn test_program_duration() {
        assert_eq!(
            with_content("<p>The programme runs 1 to 2 years.</p>", extract_program_duration),
            "1 to 2 years"
        );
        assert_eq!(
            with_content("<p>Program duration: 18 months</p>", extract_program_duration),
            "18 months"
        );
        assert_eq!(
            with_content("<p>A full master's course in Vienna.</p>", extract_program_duration),
            "1-2 years"
        );
        // "ma" must not match inside "management"
        assert_eq!(with_content("<p>Management training.</p>", extract_program_duration), "");
    }

    #[test]
    fn test_degree_keyword_patterns() {
        assert_eq!(DEGREE_BY_KEYWORD.len(), DEGREE_NAMES.len());
        assert_eq!(DURATION_BY_DEGREE.len(), DEGREE_DURATIONS.len());

        let degree = |title: &str| {
            DEGREE_BY_KEYWORD
                .iter()
                .find(|(k, _)| k.is_match(title))
                .map(|(_, name)| *name)
        };
        assert_eq!(degree("mba scholarships in london"), Some("Master of Business Administration"));
        assert_eq!(degree("erasmus masters programme"), Some("Master's Degree"));
        assert_eq!(degree("summer school in malta"), None);
    }

    #[test]
    fn test_degree_offered() {
        assert_eq!(
            with_content("<p>Text</p>", |c| extract_degree_offered(c, "Fully Funded PhD Positions")),
            "PhD/Doctorate"
        );
        assert_eq!(
            with_content("<p>Open for a master of science degree.</p>", |c| {
                extract_degree_offered(c, "Research Award")
            }),
            "Master of science degree"
        );
    }

    #[test]
    fn test_parse_post() {
        let html = r#"
            <html><body>
              <article>
                <h1 class="entry-title">Lund University Global Scholarship 2026 in Sweden</h1>
                <time>October 2, 2025</time>
                <div class="entry-content">
                  <p>Lund University offers tuition fee waivers for talented students from outside Europe.</p>
                  <p><strong>Deadline:</strong> 15 January 2026</p>
                  <p><img src="/wp-content/uploads/2025/10/lund.jpg"></p>
                  <h3>Eligibility</h3>
                  <p>Non-EU citizens.</p>
                  <div class="apply"><a href="https://www.lunduniversity.lu.se/apply">Official Website</a></div>
                </div>
              </article>
            </body></html>
        "#;
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        let s = parse_post(html, "https://opportunitiescorners.com/lund/", "Europe", today).unwrap();

        assert_eq!(s.title, "Lund University Global Scholarship 2026 in Sweden");
        assert_eq!(s.slug, "lund-university-global-scholarship-in-sweden");
        assert_eq!(s.deadline, "Deadline: 15 January 2026");
        assert_eq!(s.host_country, "Sweden");
        assert_eq!(s.host_university, "Lund University Global Scholarship 2026");
        assert_eq!(s.eligibility, "Non-EU citizens.");
        assert_eq!(s.official_link, "https://www.lunduniversity.lu.se/apply");
        assert_eq!(s.image, "https://opportunitiescorners.com/wp-content/uploads/2025/10/lund.jpg");
        assert_eq!(s.post_at, "October 2, 2025");
        assert_eq!(
            s.description,
            "Lund University offers tuition fee waivers for talented students from outside Europe."
        );
    }

    #[test]
    fn test_parse_post_requires_title() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert!(parse_post("<html><body><article><p>x</p></article></body></html>", "l", "r", today).is_none());
    }
}
