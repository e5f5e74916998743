//! HTML helpers shared by both WordPress layouts.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::warn;
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

/// Post links on a category listing page.
const LISTING_LINKS: &str = "article h2 a, .post-title a, .entry-title a, .post-box .title a";

/// Listing pages fetched per source, counting the first.
const MAX_LISTING_PAGES: usize = 3;

pub fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad status from {}", url))?;

    response
        .text()
        .with_context(|| format!("Failed to read body of {}", url))
}

/// Whitespace-collapsed text of an element.
pub fn text_of(element: ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn select_first<'a>(document: &'a Html, selectors: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selectors).ok()?;
    document.select(&selector).next()
}

/// Like [`select_first`], but earlier selectors win over document order.
pub fn select_preferred<'a>(document: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| select_first(document, s))
}

pub fn select_within<'a>(root: ElementRef<'a>, selectors: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selectors) {
        Ok(selector) => root.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Absolute `http(s)` post links on a listing page, in page order.
pub fn extract_post_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(LISTING_LINKS) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// `{url}page/{n}/`, the WordPress pagination scheme.
pub fn listing_page_url(url: &str, page: usize) -> String {
    if url.ends_with('/') {
        format!("{}page/{}/", url, page)
    } else {
        format!("{}/page/{}/", url, page)
    }
}

/// Post links from the first listing pages, deduplicated in first-seen order.
///
/// The first page must load; later pages stop at the first one that fails or
/// has no links.
pub fn collect_post_links(client: &Client, url: &str) -> Result<Vec<String>> {
    let first = extract_post_links(&fetch_html(client, url)?);
    let mut links = first.clone();

    if !first.is_empty() {
        for page in 2..=MAX_LISTING_PAGES {
            let page_url = listing_page_url(url, page);
            println!("Checking pagination: {}", page_url);
            match fetch_html(client, &page_url) {
                Ok(html) => {
                    let more = extract_post_links(&html);
                    if more.is_empty() {
                        break;
                    }
                    println!("Added {} links from page {}", more.len(), page);
                    links.extend(more);
                }
                Err(e) => {
                    warn!("Failed to load page {}: {:#}", page, e);
                    break;
                }
            }
        }
    }

    Ok(dedup_links(links))
}

pub fn dedup_links(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links.into_iter().filter(|l| seen.insert(l.clone())).collect()
}

fn is_heading(element: &ElementRef) -> bool {
    matches!(element.value().name(), "h2" | "h3" | "strong" | "b")
}

/// Text of the `p`/`ul` siblings after the first heading mentioning a keyword.
pub fn extract_section(root: ElementRef, keywords: &[&str]) -> String {
    for heading in select_within(root, "h2, h3, strong, b") {
        let label = text_of(heading).to_lowercase();
        if !keywords.iter().any(|k| label.contains(k)) {
            continue;
        }

        return heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|e| matches!(e.value().name(), "p" | "ul"))
            .map(text_of)
            .collect::<Vec<_>>()
            .join("\n");
    }
    String::new()
}

/// Top-level `p`/`ul` text before the first heading of the content area.
pub fn extract_description(content: ElementRef) -> String {
    let mut parts = Vec::new();
    for child in content.children().filter_map(ElementRef::wrap) {
        if is_heading(&child) {
            break;
        }
        if matches!(child.value().name(), "p" | "ul") {
            parts.push(text_of(child));
        }
    }
    parts.join("\n")
}

/// First absolute link whose anchor text mentions one of `keywords`.
pub fn find_official_link(content: ElementRef, keywords: &[&str]) -> String {
    select_within(content, "a")
        .into_iter()
        .find_map(|a| {
            let href = a.value().attr("href")?;
            let text = text_of(a).to_lowercase();
            (href.starts_with("http") && keywords.iter().any(|k| text.contains(k)))
                .then(|| href.to_string())
        })
        .unwrap_or_default()
}

/// Resolve an image `src` against the post URL, dropping any query string.
pub fn resolve_image_url(post_url: &str, src: &str) -> Option<String> {
    let src = src.split('?').next()?.trim();
    if src.is_empty() {
        return None;
    }
    let base = Url::parse(post_url).ok()?;
    base.join(src).ok().map(|u| u.to_string())
}

/// Featured image first, then any article image, then any content image.
pub fn find_image(
    document: &Html,
    content: Option<ElementRef>,
    post_url: &str,
    accept: fn(&str) -> bool,
) -> String {
    let pick = |images: Vec<ElementRef>| {
        images.into_iter().find_map(|img| {
            let url = resolve_image_url(post_url, img.value().attr("src")?)?;
            accept(&url).then_some(url)
        })
    };

    if let Some(article) = select_first(document, "article") {
        let featured = select_within(article, "div.post-thumbnail img, div.featured-image img");
        if let Some(url) = pick(featured.into_iter().take(1).collect()) {
            return url;
        }
        if let Some(url) = pick(select_within(article, "img")) {
            return url;
        }
    }

    content
        .and_then(|c| pick(select_within(c, "img")))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <article><h2><a href="https://scholarshipscorner.website/daad/">DAAD</a></h2></article>
          <div class="post-box"><div class="title"><a href="https://scholarshipscorner.website/mext/">MEXT</a></div></div>
          <h2 class="entry-title"><a href="/relative/">Relative</a></h2>
          <article><h2><a href="https://scholarshipscorner.website/daad/">DAAD again</a></h2></article>
        </body></html>
    "#;

    #[test]
    fn test_extract_post_links() {
        let links = extract_post_links(LISTING);
        assert_eq!(
            dedup_links(links),
            vec![
                "https://scholarshipscorner.website/daad/".to_string(),
                "https://scholarshipscorner.website/mext/".to_string(),
            ]
        );
    }

    #[test]
    fn test_listing_page_url() {
        assert_eq!(
            listing_page_url("https://opportunitiescorners.com/category/scholarships-in-uk/", 2),
            "https://opportunitiescorners.com/category/scholarships-in-uk/page/2/"
        );
        assert_eq!(listing_page_url("https://example.com/list", 3), "https://example.com/list/page/3/");
    }

    #[test]
    fn test_extract_section_and_description() {
        let html = r#"
            <div class="entry-content">
              <p>The DAAD offers scholarships.</p>
              <ul><li>Monthly stipend</li></ul>
              <h2>Eligibility Criteria</h2>
              <p>Graduates of any country.</p>
              <ul><li>Two years of experience</li></ul>
              <h3>Application Deadline</h3>
              <p>15 October 2025</p>
            </div>
        "#;
        let document = Html::parse_document(html);
        let content = select_first(&document, "div.entry-content").unwrap();

        assert_eq!(
            extract_description(content),
            "The DAAD offers scholarships.\nMonthly stipend"
        );
        assert_eq!(
            extract_section(content, &["eligibility"]),
            "Graduates of any country.\nTwo years of experience"
        );
        assert_eq!(extract_section(content, &["deadline"]), "15 October 2025");
        assert_eq!(extract_section(content, &["duration"]), "");
    }

    #[test]
    fn test_find_official_link() {
        let html = r#"
            <div class="entry-content">
              <a href="/local">Apply here</a>
              <a href="https://daad.de/">Official Website</a>
            </div>
        "#;
        let document = Html::parse_document(html);
        let content = select_first(&document, "div.entry-content").unwrap();
        assert_eq!(find_official_link(content, &["apply", "official"]), "https://daad.de/");
        assert_eq!(find_official_link(content, &["brochure"]), "");
    }

    #[test]
    fn test_find_image_resolves_and_prefers_featured() {
        let html = r#"
            <article>
              <img src="/wp-content/uploads/banner.gif">
              <div class="post-thumbnail"><img src="/wp-content/uploads/daad.jpg?w=300"></div>
            </article>
        "#;
        let document = Html::parse_document(html);
        let url = find_image(&document, None, "https://scholarshipscorner.website/daad/", |_| true);
        assert_eq!(url, "https://scholarshipscorner.website/wp-content/uploads/daad.jpg");
    }
}
