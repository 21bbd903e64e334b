//! Parser integration tests using HTML fixture files
//!
//! - Listing pages: link discovery and domain filtering
//! - Abstract pages: article extraction
//! - Charset handling for non-UTF-8 bodies

use std::fs;

use bytes::Bytes;
use unarxiv::error::ParseError;
use unarxiv::models::FetchedPage;
use unarxiv::parser::{decode_body, PageParser};
use url::Url;

/// Test fixture paths
const FIXTURES_DIR: &str = "tests/fixtures/html";

const ROOT: &str = "https://arxiv.org/";

fn load_fixture(filename: &str) -> String {
    let path = format!("{FIXTURES_DIR}/{filename}");
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to load fixture: {path}"))
}

fn fetched(url: &str, body: impl Into<Bytes>, content_type: Option<&str>) -> FetchedPage {
    FetchedPage {
        request_url: url.to_string(),
        final_url: Url::parse(url).unwrap(),
        status_code: 200,
        content_type: content_type.map(str::to_string),
        body: body.into(),
    }
}

fn fixture_page(url: &str, filename: &str) -> FetchedPage {
    fetched(url, load_fixture(filename), Some("text/html; charset=utf-8"))
}

// ============================================================================
// Listing Page Tests
// ============================================================================

#[test]
fn test_listing_page_links() {
    let parser = PageParser::new(ROOT);
    let page = fixture_page("https://arxiv.org/list/cs.CL/recent", "listing_page.html");

    let parsed = parser.parse(&page, 1);

    assert_eq!(
        parsed.links,
        vec![
            "https://arxiv.org/abs/2104.08691",
            "https://arxiv.org/abs/2104.08700",
            "https://arxiv.org/list/cs.CL/pastweek?skip=25&show=25",
        ]
    );
    assert!(parsed.article.is_none());
    assert_eq!(parsed.skipped_anchors, 1);
}

#[test]
fn test_listing_page_never_yields_binary_assets() {
    let parser = PageParser::new(ROOT);
    let page = fixture_page("https://arxiv.org/list/cs.CL/recent", "listing_page.html");

    let parsed = parser.parse(&page, 1);

    assert!(parsed
        .links
        .iter()
        .all(|link| !link.contains("/pdf/") && !link.contains("/ps/")));
}

#[test]
fn test_other_domains_are_dropped() {
    // A root on another host keeps none of the page's links
    let parser = PageParser::new("https://export.arxiv.org/");
    let page = fixture_page("https://arxiv.org/list/cs.CL/recent", "listing_page.html");

    let parsed = parser.parse(&page, 1);
    assert!(parsed.links.is_empty());
}

// ============================================================================
// Abstract Page Tests
// ============================================================================

#[test]
fn test_abstract_page_article() {
    let parser = PageParser::new(ROOT);
    let page = fixture_page("https://arxiv.org/abs/2104.08691", "abstract_page.html");

    let parsed = parser.parse(&page, 1_618_000_000_000_000_000);
    let article = parsed
        .article
        .expect("abstract page should yield an article")
        .expect("article should parse");

    assert_eq!(article.id, "2104.08691");
    assert_eq!(article.title, "Efficient Transformers for Long Documents");
    assert_eq!(article.authors, vec!["Jane Doe", "Richard Roe", "Anna Smith"]);
    assert!(article.abstract_text.starts_with("Abstract:"));
    assert!(article
        .abstract_text
        .contains("sparse attention scheme that scales linearly"));
    assert!(!article.abstract_text.contains('\n'));
    assert_eq!(article.last_update_timestamp, 1_618_000_000_000_000_000);
    assert_eq!(article.source_url.as_str(), "https://arxiv.org/abs/2104.08691");
}

#[test]
fn test_abstract_page_links() {
    let parser = PageParser::new(ROOT);
    let page = fixture_page("https://arxiv.org/abs/2104.08691", "abstract_page.html");

    let parsed = parser.parse(&page, 1);

    assert_eq!(
        parsed.links,
        vec![
            "https://arxiv.org/",
            "https://arxiv.org/list/cs.CL/recent",
            "https://arxiv.org/a/doe_j_1",
            "https://arxiv.org/a/roe_r_1",
            "https://arxiv.org/a/smith_a_1",
            "https://arxiv.org/format/2104.08691",
            "https://arxiv.org/abs/2104.08691v1",
        ]
    );
    assert_eq!(parsed.skipped_anchors, 1);
}

#[test]
fn test_article_id_from_final_url() {
    // The request redirected; the id comes from where the page was served
    let parser = PageParser::new(ROOT);
    let mut page = fixture_page("https://arxiv.org/abs/2104.08691v1", "abstract_page.html");
    page.final_url = Url::parse("https://arxiv.org/abs/2104.08691?context=cs").unwrap();

    let article = parser.parse(&page, 1).article.unwrap().unwrap();
    assert_eq!(article.id, "2104.08691");
}

#[test]
fn test_abstract_page_without_title() {
    let parser = PageParser::new(ROOT);
    let html = r#"<html><body><div class="authors">Jane Doe</div></body></html>"#;
    let page = fetched("https://arxiv.org/abs/2104.08691", html, None);

    let parsed = parser.parse(&page, 1);
    assert_eq!(parsed.article, Some(Err(ParseError::EmptyTitle)));
}

#[test]
fn test_abstract_page_without_authors() {
    let parser = PageParser::new(ROOT);
    let html = r#"<html><body><h1 class="title mathjax">Title</h1></body></html>"#;
    let page = fetched("https://arxiv.org/abs/2104.08691", html, None);

    let parsed = parser.parse(&page, 1);
    assert_eq!(parsed.article, Some(Err(ParseError::EmptyAuthors)));
}

#[test]
fn test_short_article_id() {
    let parser = PageParser::new(ROOT);
    let page = fixture_page("https://arxiv.org/abs/xy", "abstract_page.html");

    let parsed = parser.parse(&page, 1);
    assert_eq!(
        parsed.article,
        Some(Err(ParseError::TooShortArticleId("xy".to_string())))
    );
}

// ============================================================================
// Charset Tests
// ============================================================================

#[test]
fn test_latin1_body_is_decoded() {
    // "Gödel" in ISO-8859-1
    let body: &[u8] = b"<h1 class=\"title mathjax\">G\xf6del</h1><div class=\"authors\">Kurt G\xf6del</div>";
    let text = decode_body(body, Some("text/html; charset=ISO-8859-1"));
    assert!(text.contains("Gödel"));

    let parser = PageParser::new(ROOT);
    let page = fetched(
        "https://arxiv.org/abs/2104.08691",
        body.to_vec(),
        Some("text/html; charset=iso-8859-1"),
    );
    let article = parser.parse(&page, 1).article.unwrap().unwrap();
    assert_eq!(article.title, "Gödel");
    assert_eq!(article.authors, vec!["Kurt Gödel"]);
}

#[test]
fn test_unknown_charset_falls_back_to_utf8() {
    let text = decode_body("naïve".as_bytes(), Some("text/html; charset=x-unknown"));
    assert_eq!(text, "naïve");
}
