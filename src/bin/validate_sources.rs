//! Source Validation Binary
//!
//! Validates tracking/sources.yml before a scrape:
//! - Checks every source names a supported site layout
//! - Checks names and URLs are present and use http(s)
//! - Warns when a URL's host does not match its declared site

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use scholarship_pipeline::types::SiteKind;

/// Loosely typed so an unknown `site` is reported instead of failing the parse.
#[derive(Debug, Deserialize, Clone)]
struct RawSource {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    site: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawSources {
    sources: Vec<RawSource>,
}

fn load_sources(root: &str) -> Result<RawSources> {
    let path = PathBuf::from(root).join("tracking/sources.yml");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read sources from {:?}", path))?;

    let sources: RawSources = serde_yaml::from_str(&content)
        .with_context(|| "Failed to parse sources YAML")?;

    Ok(sources)
}

fn parse_site(site: &str) -> Option<SiteKind> {
    serde_yaml::from_str(site).ok()
}

fn validate(sources: &[RawSource]) -> (Vec<String>, Vec<String>) {
    let supported = [SiteKind::ScholarshipsCorner, SiteKind::OpportunitiesCorners]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for source in sources {
        let site = parse_site(&source.site);
        if site.is_none() {
            errors.push(format!(
                "Source '{}' has unsupported site: '{}'. Supported sites: {:?}",
                source.name, source.site, supported
            ));
        }

        if source.name.is_empty() {
            errors.push(format!("Source with URL '{}' has empty name", source.url));
        } else if !seen.insert(source.name.to_lowercase()) {
            warnings.push(format!(
                "Source '{}' is listed twice; both write the same region file",
                source.name
            ));
        }

        if source.url.is_empty() {
            errors.push(format!("Source '{}' has empty URL", source.name));
        } else if !source.url.starts_with("http://") && !source.url.starts_with("https://") {
            errors.push(format!(
                "Source '{}' has URL without http/https scheme: {}",
                source.name, source.url
            ));
        }

        if let (Some(site), Some(detected)) = (site, SiteKind::from_url(&source.url)) {
            if site != detected {
                warnings.push(format!(
                    "Source '{}' is declared as {} but its URL looks like {}",
                    source.name, site, detected
                ));
            }
        }

        if !source.url.is_empty() && !source.url.ends_with('/') {
            warnings.push(format!(
                "Source '{}' URL has no trailing slash; pagination will add one",
                source.name
            ));
        }
    }

    (errors, warnings)
}

fn main() -> Result<()> {
    let root = std::env::var("ROOT").unwrap_or_else(|_| ".".to_string());

    println!("=== Source Configuration Validator ===");

    let sources = load_sources(&root).context("Failed to load sources.yml")?;
    let enabled = sources.sources.iter().filter(|s| s.enabled).count();
    let (errors, warnings) = validate(&sources.sources);

    if errors.is_empty() && warnings.is_empty() {
        println!(
            "✓ All {} sources are valid ({} enabled)",
            sources.sources.len(),
            enabled
        );
        return Ok(());
    }

    if !errors.is_empty() {
        println!("\n❌ ERRORS (must fix):");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  WARNINGS:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
