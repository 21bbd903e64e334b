//! HTML parsing and data extraction
//!
//! [`PageParser`] turns a [`FetchedPage`] into owned results: the crawlable
//! links found on the page and, for abstract pages, the extracted article.
//! Parsing is synchronous; `scraper::Html` never crosses an `.await`.

pub mod article;
pub mod links;
pub mod selectors;

pub use article::{extract_article, extract_article_id, is_abstract_page};
pub use links::{crawlable_link, is_crawlable, normalize_link};

use encoding_rs::{Encoding, UTF_8};
use scraper::Html;

use crate::models::{ArticleRecord, FetchedPage};
use crate::utils::error::ParseError;

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Crawlable links, normalised, in document order
    pub links: Vec<String>,

    /// `None` for non-abstract pages; otherwise the extraction result
    pub article: Option<Result<ArticleRecord, ParseError>>,

    /// Anchors dropped because they carried no href
    pub skipped_anchors: usize,
}

/// Link and article extractor bound to one crawl root
#[derive(Debug, Clone)]
pub struct PageParser {
    root_url: String,
}

impl PageParser {
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
        }
    }

    /// Parse a fetched page
    ///
    /// Links are collected for any status; an article only from a 2xx
    /// abstract page. `timestamp` (Unix nanoseconds) stamps that article.
    pub fn parse(&self, page: &FetchedPage, timestamp: u64) -> ParsedPage {
        let html = decode_body(&page.body, page.content_type.as_deref());
        self.parse_html(&html, page, timestamp)
    }

    fn parse_html(&self, html: &str, page: &FetchedPage, timestamp: u64) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut parsed = ParsedPage::default();

        for anchor in document.select(&selectors::ANCHOR) {
            let Some(href) = anchor.value().attr("href") else {
                tracing::trace!(url = %page.request_url, error = %ParseError::MissingHref, "Skipping anchor");
                parsed.skipped_anchors += 1;
                continue;
            };

            if let Some(link) = crawlable_link(href, &self.root_url) {
                parsed.links.push(link);
            }
        }

        if page.is_success() && is_abstract_page(&page.final_url) {
            parsed.article = Some(extract_article(&document, &page.final_url, timestamp));
        }

        parsed
    }
}

/// Decode a response body using the charset from its Content-Type
///
/// Unknown or missing charsets fall back to UTF-8; malformed sequences are
/// replaced rather than rejected.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "Body contained malformed sequences");
    }
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;

    const ROOT: &str = "https://arxiv.org/";

    fn page(url: &str, html: &str) -> FetchedPage {
        FetchedPage {
            request_url: url.to_string(),
            final_url: Url::parse(url).unwrap(),
            status_code: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: Bytes::from(html.to_string()),
        }
    }

    #[test]
    fn test_listing_page_links_only() {
        let html = r#"
            <a href="/abs/2104.00001">one</a>
            <a href="https://arxiv.org/abs/2104.00002">two</a>
            <a href="/pdf/2104.00001">pdf</a>
            <a href="/ps/2104.00001">ps</a>
            <a href="https://github.com/">elsewhere</a>
            <a name="anchor-only">no href</a>
        "#;
        let parsed = PageParser::new(ROOT).parse(&page("https://arxiv.org/list/cs.AI/recent", html), 1);

        assert_eq!(
            parsed.links,
            vec![
                "https://arxiv.org/abs/2104.00001".to_string(),
                "https://arxiv.org/abs/2104.00002".to_string(),
            ]
        );
        assert_eq!(parsed.skipped_anchors, 1);
        assert!(parsed.article.is_none());
    }

    #[test]
    fn test_abstract_page_yields_article() {
        let html = r#"
            <h1 class="title mathjax">Title</h1>
            <div class="authors">A One, B Two</div>
            <blockquote class="abstract mathjax">Abstract</blockquote>
            <a href="/list/cs.AI/recent">list</a>
        "#;
        let parsed = PageParser::new(ROOT).parse(&page("https://arxiv.org/abs/2104.00001", html), 9);

        let article = parsed.article.unwrap().unwrap();
        assert_eq!(article.id, "2104.00001");
        assert_eq!(article.authors.len(), 2);
        assert_eq!(article.last_update_timestamp, 9);
        assert_eq!(parsed.links, vec!["https://arxiv.org/list/cs.AI/recent".to_string()]);
    }

    #[test]
    fn test_error_page_keeps_links_without_article() {
        let html = r#"
            <h1 class="title mathjax">Not Found</h1>
            <div class="authors">Nobody</div>
            <a href="/list/cs.AI/recent">list</a>
        "#;
        let mut not_found = page("https://arxiv.org/abs/2104.99999", html);
        not_found.status_code = 404;

        let parsed = PageParser::new(ROOT).parse(&not_found, 1);
        assert_eq!(parsed.links, vec!["https://arxiv.org/list/cs.AI/recent".to_string()]);
        assert!(parsed.article.is_none());
    }

    #[test]
    fn test_short_id_produces_error_not_record() {
        let html = r#"<h1 class="title mathjax">T</h1><div class="authors">A</div>"#;
        let parsed = PageParser::new(ROOT).parse(&page("https://arxiv.org/abs/xy", html), 0);
        assert_eq!(
            parsed.article,
            Some(Err(ParseError::TooShortArticleId("xy".to_string())))
        );
    }

    #[test]
    fn test_decode_body_with_charset() {
        // "café" in ISO-8859-1
        let latin1: &[u8] = &[0x63, 0x61, 0x66, 0xe9];
        assert_eq!(decode_body(latin1, Some("text/html; charset=ISO-8859-1")), "café");
        assert_eq!(decode_body("café".as_bytes(), Some("text/html")), "café");
        assert_eq!(decode_body("café".as_bytes(), None), "café");
    }

    #[test]
    fn test_charset_label() {
        assert_eq!(charset_label("text/html; charset=utf-8"), Some("utf-8"));
        assert_eq!(charset_label(r#"text/html; Charset="EUC-KR""#), Some("EUC-KR"));
        assert_eq!(charset_label("text/html"), None);
    }
}
