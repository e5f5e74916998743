use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const TITLE: &str = "Title";
pub const DEADLINE: &str = "Deadline";
pub const HOST_COUNTRY: &str = "Host Country";
pub const HOST_UNIVERSITY: &str = "Host University";

/// Column order of every scholarship CSV written by this crate.
pub const CSV_HEADERS: [&str; 14] = [
    "Title",
    "Slug",
    "Description",
    "Link",
    "Official Link",
    "Image",
    "Deadline",
    "Eligibility",
    "Host Country",
    "Host University",
    "Program Duration",
    "Degree Offered",
    "Region",
    "Post_at",
];

/// A record made of named text fields.
///
/// Empty values count as absent, so callers never have to tell a missing
/// column from a blank cell.
pub trait Record {
    fn field(&self, name: &str) -> Option<&str>;

    fn title(&self) -> Option<&str> {
        self.field(TITLE)
    }

    fn deadline(&self) -> Option<&str> {
        self.field(DEADLINE)
    }

    fn host_country(&self) -> Option<&str> {
        self.field(HOST_COUNTRY)
    }

    fn host_university(&self) -> Option<&str> {
        self.field(HOST_UNIVERSITY)
    }
}

fn present(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Record for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| present(v))
    }
}

impl Record for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| present(v))
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Option<&str> {
        (**self).field(name)
    }
}

/// One scraped scholarship posting, as stored in the CSV files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Scholarship {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Slug")]
    pub slug: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Link")]
    pub link: String,
    #[serde(rename = "Official Link")]
    pub official_link: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Deadline")]
    pub deadline: String,
    #[serde(rename = "Eligibility")]
    pub eligibility: String,
    #[serde(rename = "Host Country")]
    pub host_country: String,
    #[serde(rename = "Host University")]
    pub host_university: String,
    #[serde(rename = "Program Duration")]
    pub program_duration: String,
    #[serde(rename = "Degree Offered")]
    pub degree_offered: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Post_at")]
    pub post_at: String,
}

impl Record for Scholarship {
    fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "Title" => &self.title,
            "Slug" => &self.slug,
            "Description" => &self.description,
            "Link" => &self.link,
            "Official Link" => &self.official_link,
            "Image" => &self.image,
            "Deadline" => &self.deadline,
            "Eligibility" => &self.eligibility,
            "Host Country" => &self.host_country,
            "Host University" => &self.host_university,
            "Program Duration" => &self.program_duration,
            "Degree Offered" => &self.degree_offered,
            "Region" => &self.region,
            "Post_at" => &self.post_at,
            _ => return None,
        };
        present(value)
    }
}

/// Which WordPress site layout a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    ScholarshipsCorner,
    OpportunitiesCorners,
}

impl SiteKind {
    /// Guess the layout from the host name.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.to_lowercase();
        if url.contains("scholarshipscorner.website") {
            Some(SiteKind::ScholarshipsCorner)
        } else if url.contains("opportunitiescorners.com") {
            Some(SiteKind::OpportunitiesCorners)
        } else {
            None
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteKind::ScholarshipsCorner => write!(f, "scholarships_corner"),
            SiteKind::OpportunitiesCorners => write!(f, "opportunities_corners"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Sources {
    pub sources: Vec<Source>,
}

/// A region listing page to scrape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub site: SiteKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_absent() {
        let s = Scholarship {
            title: "DAAD".to_string(),
            ..Default::default()
        };
        assert_eq!(s.title(), Some("DAAD"));
        assert_eq!(s.deadline(), None);
        assert_eq!(s.field("Unknown"), None);
    }

    #[test]
    fn test_map_record() {
        let mut m = HashMap::new();
        m.insert("Title".to_string(), "Chevening".to_string());
        m.insert("Deadline".to_string(), String::new());
        assert_eq!(m.title(), Some("Chevening"));
        assert_eq!(m.deadline(), None);
        assert_eq!(m.host_country(), None);
    }

    #[test]
    fn test_site_kind_from_url() {
        assert_eq!(
            SiteKind::from_url("https://scholarshipscorner.website/scholarships-in-africa/"),
            Some(SiteKind::ScholarshipsCorner)
        );
        assert_eq!(
            SiteKind::from_url("https://OpportunitiesCorners.com/category/x/"),
            Some(SiteKind::OpportunitiesCorners)
        );
        assert_eq!(SiteKind::from_url("https://example.com"), None);
    }

    #[test]
    fn test_sources_yaml() {
        let yaml = r#"
sources:
  - name: Africa
    url: https://scholarshipscorner.website/scholarships-in-africa/
    site: scholarships_corner
  - name: UK
    url: https://opportunitiescorners.com/category/scholarships-in-uk/
    site: opportunities_corners
    enabled: false
"#;
        let sources: Sources = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sources.sources.len(), 2);
        assert!(sources.sources[0].enabled);
        assert_eq!(sources.sources[1].site, SiteKind::OpportunitiesCorners);
        assert!(!sources.sources[1].enabled);
    }
}
