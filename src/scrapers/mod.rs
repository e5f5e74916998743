pub mod common;
pub mod opportunities_corners;
pub mod scholarships_corner;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::{error, warn};
use reqwest::blocking::Client;

use crate::files::{ensure_file_can_be_created, validate_csv_file};
use crate::storage::write_scholarships;
use crate::types::{Scholarship, SiteKind, Source};

/// Pause between post requests to the same site.
const POST_DELAY: Duration = Duration::from_secs(1);

pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent("Mozilla/5.0 (compatible; ScholarshipBot/1.0)")
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// `scholarships-<region>.csv`, lowercased with spaces turned into hyphens.
pub fn region_filename(region: &str) -> String {
    format!("scholarships-{}.csv", region.to_lowercase().replace(' ', "-"))
}

pub fn parse_post(
    site: SiteKind,
    html: &str,
    link: &str,
    region: &str,
    today: NaiveDate,
) -> Option<Scholarship> {
    match site {
        SiteKind::ScholarshipsCorner => scholarships_corner::parse_post(html, link, region, today),
        SiteKind::OpportunitiesCorners => opportunities_corners::parse_post(html, link, region, today),
    }
}

/// Scrape one source into a region CSV under `work_dir`.
///
/// Returns the file written, or `None` when no free file name was found.
/// A post that fails to load or parse is logged and skipped.
pub fn scrape_region(client: &Client, source: &Source, work_dir: &Path) -> Result<Option<PathBuf>> {
    println!("\n=== Scraping {} scholarships from {} ===", source.name, source.site);

    let base = work_dir.join(region_filename(&source.name));
    let path = match ensure_file_can_be_created(&base, true, false)? {
        Some(path) => path,
        None => {
            warn!("Could not create a suitable filename for {} data", source.name);
            return Ok(None);
        }
    };
    println!("Will save data to: {}", path.display());

    let links = common::collect_post_links(client, &source.url)?;
    println!("Found {} posts to scrape for {}", links.len(), source.name);

    let today = Local::now().date_naive();
    let mut rows = Vec::new();
    for (index, link) in links.iter().enumerate() {
        if index > 0 {
            thread::sleep(POST_DELAY);
        }

        let html = match common::fetch_html(client, link) {
            Ok(html) => html,
            Err(e) => {
                error!("Error processing post {} in {}: {:#}", index + 1, source.name, e);
                continue;
            }
        };

        match parse_post(source.site, &html, link, &source.name, today) {
            Some(row) => {
                let preview: String = row.title.chars().take(50).collect();
                println!("✅ {} - Saved {}/{}: {}", source.name, index + 1, links.len(), preview);
                rows.push(row);
            }
            None => warn!("No title or content found for {}, skipping", link),
        }
    }

    write_scholarships(&path, &rows)?;
    if validate_csv_file(&path) {
        println!("✅ Validated CSV file: {}", path.display());
    } else {
        warn!("CSV file {:?} may be invalid or empty", path);
    }

    Ok(Some(path))
}

/// Async wrapper running the blocking scraper off the runtime threads.
pub async fn scrape_source(source: &Source, work_dir: &Path) -> Result<Option<PathBuf>> {
    let source = source.clone();
    let work_dir = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let client = build_client()?;
        scrape_region(&client, &source, &work_dir)
    })
    .await
    .unwrap_or_else(|e| Err(anyhow::anyhow!("Task join error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_filename() {
        assert_eq!(region_filename("Africa"), "scholarships-africa.csv");
        assert_eq!(region_filename("North America"), "scholarships-north-america.csv");
        assert_eq!(
            region_filename("Europe-OpportunitiesCorners"),
            "scholarships-europe-opportunitiescorners.csv"
        );
    }

    #[test]
    fn test_parse_post_dispatches_by_site() {
        let html = r#"<html><body><h1 class="entry-title">GKS Korea</h1></body></html>"#;
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        // no content area: OpportunitiesCorners skips, ScholarshipsCorner keeps
        assert!(parse_post(SiteKind::OpportunitiesCorners, html, "l", "Asia", today).is_none());
        let row = parse_post(SiteKind::ScholarshipsCorner, html, "l", "Asia", today).unwrap();
        assert_eq!(row.title, "GKS Korea");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client().is_ok());
    }
}
