// Core data structures for the unarxiv crawler

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Crawl target read once per crawl invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfiguration {
    /// Root URL of the crawled site; doubles as the in-domain substring filter
    pub root_url: String,

    /// Stop dispatching once the article store holds this many records
    pub desired_article_count: u64,
}

impl CrawlConfiguration {
    pub fn new(root_url: impl Into<String>, desired_article_count: u64) -> Self {
        Self {
            root_url: root_url.into(),
            desired_article_count,
        }
    }
}

/// One row of the durable frontier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub visited: bool,
    /// Unix nanoseconds of the last completed fetch
    pub last_access: Option<u64>,
    pub last_http_status: Option<u16>,
}

impl FrontierEntry {
    /// A freshly discovered, unvisited URL
    pub fn unvisited(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            visited: false,
            last_access: None,
            last_http_status: None,
        }
    }
}

/// Raw response handed from the Fetcher to the Parser
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL as dispatched from the frontier
    pub request_url: String,

    /// URL of the final response after redirects
    pub final_url: Url,

    pub status_code: u16,

    /// Content-Type header, used for charset detection
    pub content_type: Option<String>,

    pub body: Bytes,
}

impl FetchedPage {
    /// Whether the response carries a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Ingested article metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Identifier following `abs/` in the source URL
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Ingestion wall-clock time in Unix nanoseconds
    pub last_update_timestamp: u64,
    pub source_url: Url,
}

impl ArticleRecord {
    /// Field-wise equality ignoring `last_update_timestamp`
    ///
    /// Comparison is exact: any byte difference in title, abstract or an
    /// author name, or a change in author count, counts as a change.
    pub fn same_content(&self, other: &ArticleRecord) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.abstract_text == other.abstract_text
            && self.source_url.as_str() == other.source_url.as_str()
            && self.authors.len() == other.authors.len()
            && self
                .authors
                .iter()
                .zip(other.authors.iter())
                .all(|(a, b)| a == b)
    }
}
