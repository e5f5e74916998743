use chrono::NaiveDate;
use scraper::Html;

use super::common::{
    extract_description, extract_section, find_image, find_official_link, select_first, text_of,
};
use crate::normalize::generate_slug;
use crate::types::Scholarship;

const TITLE: &str = "h1.entry-title, .post-title h1, article h1";
const CONTENT: &str = "div.entry-content, article .post-content, .content-inner";

fn is_image_file(url: &str) -> bool {
    let url = url.to_lowercase();
    [".jpg", ".jpeg", ".png", ".gif"].iter().any(|ext| url.ends_with(ext))
}

/// Parse a ScholarshipsCorner post. Posts without a title use their link.
pub fn parse_post(html: &str, link: &str, region: &str, today: NaiveDate) -> Option<Scholarship> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = select_first(&document, TITLE)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| link.to_string());

    let content = select_first(&document, CONTENT);

    Some(Scholarship {
        slug: generate_slug(&title),
        description: content.map(extract_description).unwrap_or_default(),
        link: link.to_string(),
        official_link: content
            .map(|c| find_official_link(c, &["apply", "official", "website"]))
            .unwrap_or_default(),
        image: find_image(&document, content, link, is_image_file),
        deadline: extract_section(root, &["deadline", "closing date", "application deadline"]),
        eligibility: extract_section(root, &["eligibility", "who can apply", "requirements"]),
        host_country: extract_section(root, &["host country", "destination", "country"]),
        host_university: extract_section(root, &["university", "institution", "school"]),
        program_duration: extract_section(root, &["duration", "period", "length"]),
        degree_offered: extract_section(root, &["degree", "level of study", "program"]),
        region: region.to_string(),
        post_at: today.format("%Y-%m-%d").to_string(),
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: &str = r#"
        <html><body>
          <article>
            <h1 class="entry-title">Stipendium Hungaricum Scholarship 2026 in Hungary (Fully Funded)</h1>
            <div class="post-thumbnail"><img src="https://scholarshipscorner.website/wp-content/uploads/sh.png?resize=1"></div>
            <div class="entry-content">
              <p>The Government of Hungary invites international students.</p>
              <h2>Host Country</h2>
              <p>Hungary</p>
              <h2>Degree Level</h2>
              <p>Bachelor, Master and PhD</p>
              <h2>Eligibility Criteria</h2>
              <ul><li>Open to all nationalities</li></ul>
              <h2>Application Deadline</h2>
              <p>15 January 2026</p>
              <p><a href="https://stipendiumhungaricum.hu/apply/">Apply Now</a></p>
            </div>
          </article>
        </body></html>
    "#;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    #[test]
    fn test_parse_post() {
        let link = "https://scholarshipscorner.website/stipendium-hungaricum/";
        let s = parse_post(POST, link, "Europe", today()).unwrap();

        assert_eq!(s.title, "Stipendium Hungaricum Scholarship 2026 in Hungary (Fully Funded)");
        assert_eq!(s.slug, "stipendium-hungaricum-scholarship-in-hungary");
        assert_eq!(s.description, "The Government of Hungary invites international students.");
        assert_eq!(s.host_country, "Hungary");
        assert_eq!(s.degree_offered, "Bachelor, Master and PhD");
        assert_eq!(s.eligibility, "Open to all nationalities");
        assert_eq!(s.official_link, "https://stipendiumhungaricum.hu/apply/");
        assert_eq!(s.image, "https://scholarshipscorner.website/wp-content/uploads/sh.png");
        assert_eq!(s.region, "Europe");
        assert_eq!(s.post_at, "2025-11-20");
        assert_eq!(s.link, link);
    }

    #[test]
    fn test_parse_post_without_title_uses_link() {
        let s = parse_post("<html><body><p>Nothing</p></body></html>", "https://x.test/p/", "Asia", today())
            .unwrap();
        assert_eq!(s.title, "https://x.test/p/");
        assert_eq!(s.description, "");
        assert_eq!(s.image, "");
    }
}
