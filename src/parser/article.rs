//! Article metadata extraction from abstract pages

use scraper::{Html, Selector};
use url::Url;

use super::selectors::{ABSTRACT, AUTHORS, TITLE};
use crate::models::ArticleRecord;
use crate::utils::collapse_newlines;
use crate::utils::error::ParseError;

/// Path marker identifying an abstract page
pub const ABSTRACT_MARKER: &str = "abs/";

/// Shortest accepted article identifier, in characters
pub const MIN_ARTICLE_ID_LEN: usize = 3;

/// Whether a URL points at an abstract page
pub fn is_abstract_page(url: &Url) -> bool {
    url.path().contains("/abs/")
}

/// Derive the article id: everything after the last `abs/`, without query or
/// fragment
pub fn extract_article_id(url: &str) -> Result<String, ParseError> {
    let tail = url
        .rsplit_once(ABSTRACT_MARKER)
        .map(|(_, tail)| tail)
        .unwrap_or(url);
    let id = tail.split(['?', '#']).next().unwrap_or_default();

    if id.chars().count() < MIN_ARTICLE_ID_LEN {
        return Err(ParseError::TooShortArticleId(id.to_string()));
    }

    Ok(id.to_string())
}

/// Concatenated text of every element matching `selector`, newlines collapsed
fn text_of(document: &Html, selector: &Selector) -> String {
    let raw: String = document
        .select(selector)
        .flat_map(|element| element.text())
        .collect();
    collapse_newlines(&raw)
}

/// Extract an [`ArticleRecord`] from a parsed abstract page
///
/// `timestamp` becomes the record's `last_update_timestamp`.
pub fn extract_article(
    document: &Html,
    source_url: &Url,
    timestamp: u64,
) -> Result<ArticleRecord, ParseError> {
    let id = extract_article_id(source_url.as_str())?;

    let title = text_of(document, &TITLE);
    if title.is_empty() {
        return Err(ParseError::EmptyTitle);
    }

    let authors_raw = text_of(document, &AUTHORS);
    if authors_raw.is_empty() {
        return Err(ParseError::EmptyAuthors);
    }
    let authors = authors_raw.split(", ").map(str::to_string).collect();

    let abstract_text = text_of(document, &ABSTRACT);

    Ok(ArticleRecord {
        id,
        title,
        authors,
        abstract_text,
        last_update_timestamp: timestamp,
        source_url: source_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <h1 class="title mathjax">
                Sparse Attention
                for Long Documents
            </h1>
            <div class="authors"><a>Ada Lovelace</a>, <a>Alan Turing</a>, <a>Grace Hopper</a></div>
            <blockquote class="abstract mathjax">
                We study
                attention.
            </blockquote>
        </body></html>
    "#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_article_id() {
        assert_eq!(
            extract_article_id("https://arxiv.org/abs/1234.5678").unwrap(),
            "1234.5678"
        );
        assert_eq!(
            extract_article_id("https://arxiv.org/abs/1234.5678v2?context=cs").unwrap(),
            "1234.5678v2"
        );
        assert_eq!(
            extract_article_id("https://arxiv.org/abs/cs/0112017").unwrap(),
            "cs/0112017"
        );
    }

    #[test]
    fn test_too_short_article_id() {
        assert_eq!(
            extract_article_id("https://arxiv.org/abs/xy"),
            Err(ParseError::TooShortArticleId("xy".to_string()))
        );
        assert!(extract_article_id("https://arxiv.org/abs/").is_err());
    }

    #[test]
    fn test_is_abstract_page() {
        assert!(is_abstract_page(&url("https://arxiv.org/abs/2104.00001")));
        assert!(!is_abstract_page(&url("https://arxiv.org/list/cs.AI/recent")));
        assert!(!is_abstract_page(&url("https://arxiv.org/?q=abs/1234")));
    }

    #[test]
    fn test_extract_article() {
        let doc = Html::parse_document(PAGE);
        let source = url("https://arxiv.org/abs/2104.00001");
        let article = extract_article(&doc, &source, 7).unwrap();

        assert_eq!(article.id, "2104.00001");
        assert!(article.title.starts_with("Sparse Attention"));
        assert!(!article.title.contains('\n'));
        assert_eq!(
            article.authors,
            vec!["Ada Lovelace", "Alan Turing", "Grace Hopper"]
        );
        assert!(article.abstract_text.starts_with("We study"));
        assert!(article.abstract_text.ends_with("attention."));
        assert_eq!(article.last_update_timestamp, 7);
        assert_eq!(article.source_url, source);
    }

    #[test]
    fn test_empty_title() {
        let doc = Html::parse_document(r#"<div class="authors">A, B</div>"#);
        let result = extract_article(&doc, &url("https://arxiv.org/abs/2104.00001"), 0);
        assert_eq!(result, Err(ParseError::EmptyTitle));
    }

    #[test]
    fn test_empty_authors() {
        let doc = Html::parse_document(
            r#"<h1 class="title mathjax">T</h1><div class="authors"> </div>"#,
        );
        let result = extract_article(&doc, &url("https://arxiv.org/abs/2104.00001"), 0);
        assert_eq!(result, Err(ParseError::EmptyAuthors));
    }

    #[test]
    fn test_missing_abstract_is_allowed() {
        let doc = Html::parse_document(
            r#"<h1 class="title mathjax">T</h1><div class="authors">Solo Author</div>"#,
        );
        let article = extract_article(&doc, &url("https://arxiv.org/abs/2104.00001"), 0).unwrap();
        assert_eq!(article.abstract_text, "");
        assert_eq!(article.authors, vec!["Solo Author"]);
    }
}
