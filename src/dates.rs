//! Deadline parsing and publication-date policy for the database upload.

use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Expired postings are back-dated this many days before their deadline.
pub const EXPIRED_POST_OFFSET_DAYS: i64 = 30;

const MONTH: &str = r"\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b";

lazy_static! {
    static ref TRAILER_RE: Regex = Regex::new(r"(?i)(?:apply now|official link).*").unwrap();
    static ref DAY_MONTH_YEAR_RE: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s*(?:of\s+)?{}\s*,?\s*(\d{{4}})\b",
        MONTH
    ))
    .unwrap();
    static ref MONTH_DAY_YEAR_RE: Regex = Regex::new(&format!(
        r"(?i){}\s*(\d{{1,2}})(?:st|nd|rd|th)?\s*,?\s*(\d{{4}})\b",
        MONTH
    ))
    .unwrap();
    static ref ISO_RE: Regex = Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").unwrap();
    static ref YEAR_MONTH_DAY_RE: Regex =
        Regex::new(&format!(r"(?i)\b(\d{{4}})\s*{}\s*(\d{{1,2}})\b", MONTH)).unwrap();
    static ref MONTH_YEAR_RE: Regex =
        Regex::new(&format!(r"(?i){}\s*,?\s*(\d{{4}})\b", MONTH)).unwrap();
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)?.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn number(caps: &Captures, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn month(caps: &Captures, index: usize) -> Option<u32> {
    month_number(caps.get(index)?.as_str())
}

fn date(year: Option<u32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year? as i32, month?, day?)
}

/// Pull a calendar date out of a free-form scraped deadline.
///
/// Understands `15 March 2025`, `15th March, 2025`, `March 15, 2025`,
/// `2025-03-15`, `2025/3/15`, `2025 March 15` and `March 2025` (first of the
/// month). Anything after "Apply Now" or "Official Link" is ignored.
pub fn clean_date(raw: &str) -> Option<NaiveDate> {
    let text = TRAILER_RE.replace(raw, "");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // a full date that matches but does not exist (31 February) is rejected
    // rather than degraded to its month
    if let Some(caps) = DAY_MONTH_YEAR_RE.captures(text) {
        return date(number(&caps, 3), month(&caps, 2), number(&caps, 1));
    }
    if let Some(caps) = MONTH_DAY_YEAR_RE.captures(text) {
        return date(number(&caps, 3), month(&caps, 1), number(&caps, 2));
    }
    if let Some(caps) = ISO_RE.captures(text) {
        return date(number(&caps, 1), number(&caps, 2), number(&caps, 3));
    }
    if let Some(caps) = YEAR_MONTH_DAY_RE.captures(text) {
        return date(number(&caps, 1), month(&caps, 2), number(&caps, 3));
    }
    if let Some(caps) = MONTH_YEAR_RE.captures(text) {
        return date(number(&caps, 2), month(&caps, 1), Some(1));
    }

    None
}

/// Publication date for a newly inserted scholarship.
///
/// Already expired postings are dated a month before their deadline so they
/// sort behind live ones; everything else is published today.
pub fn post_at_for(deadline: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    match deadline {
        Some(d) if d < today => d - Duration::days(EXPIRED_POST_OFFSET_DAYS),
        _ => today,
    }
}

lazy_static! {
    static ref REGION_FILE_RE: Regex = Regex::new(r"scholarships-([A-Za-z-]+)").unwrap();
}

/// Region of a row: its own `Region` value, else the one encoded in a
/// `scholarships-<region>.csv` file name.
pub fn region_for(row_region: &str, file_name: &str) -> Option<String> {
    let row_region = row_region.trim();
    if !row_region.is_empty() {
        return Some(row_region.to_string());
    }

    let caps = REGION_FILE_RE.captures(file_name)?;
    let words: Vec<String> = caps[1]
        .split('-')
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_clean_date_formats() {
        assert_eq!(clean_date("15 March 2025"), Some(ymd(2025, 3, 15)));
        assert_eq!(clean_date("Deadline: 31st May, 2025"), Some(ymd(2025, 5, 31)));
        assert_eq!(clean_date("March 15, 2025"), Some(ymd(2025, 3, 15)));
        assert_eq!(clean_date("Deadline: 2025-03-05"), Some(ymd(2025, 3, 5)));
        assert_eq!(clean_date("2025/3/5"), Some(ymd(2025, 3, 5)));
        assert_eq!(clean_date("2025 March 7"), Some(ymd(2025, 3, 7)));
        assert_eq!(clean_date("Applications close in October 2025"), Some(ymd(2025, 10, 1)));
        assert_eq!(clean_date("Sept 30, 2026"), Some(ymd(2026, 9, 30)));
    }

    #[test]
    fn test_clean_date_strips_trailers() {
        assert_eq!(
            clean_date("June 1, 2025 Apply Now 2026-01-01"),
            Some(ymd(2025, 6, 1))
        );
        assert_eq!(clean_date("Official Link: March 3, 2025"), None);
    }

    #[test]
    fn test_clean_date_rejects_garbage() {
        assert_eq!(clean_date(""), None);
        assert_eq!(clean_date("Deadline not specified"), None);
        assert_eq!(clean_date("Varies"), None);
        assert_eq!(clean_date("31 February 2025"), None);
    }

    #[test]
    fn test_post_at_policy() {
        let today = ymd(2025, 6, 1);
        assert_eq!(post_at_for(Some(ymd(2025, 5, 1)), today), ymd(2025, 4, 1));
        assert_eq!(post_at_for(Some(ymd(2025, 7, 1)), today), today);
        assert_eq!(post_at_for(Some(today), today), today);
        assert_eq!(post_at_for(None, today), today);
    }

    #[test]
    fn test_region_for() {
        assert_eq!(region_for("Africa", "whatever.csv"), Some("Africa".to_string()));
        assert_eq!(
            region_for("", "scholarships-north-america.csv"),
            Some("North America".to_string())
        );
        assert_eq!(
            region_for(" ", "scholarships-uk-20250101_120000.csv"),
            Some("Uk".to_string())
        );
        assert_eq!(region_for("", "all_scholarships.csv"), None);
    }
}
