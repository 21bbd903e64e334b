//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use unarxiv::crawler::{CrawlerPipeline, PipelineBuilder};
use unarxiv::metrics::CrawlMetrics;
use unarxiv::storage::{ArticleStore, FrontierStore};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Root URL of a mock server, with trailing slash
pub fn root_url(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

/// Pipeline tuned for tests: fast polling, no effective rate limit
pub fn test_pipeline(
    frontier: Arc<dyn FrontierStore>,
    articles: Arc<dyn ArticleStore>,
    metrics: Arc<CrawlMetrics>,
) -> CrawlerPipeline {
    PipelineBuilder::new()
        .poll_interval(Duration::from_millis(20))
        .requests_per_second(1000)
        .request_timeout(Duration::from_secs(5))
        .build(frontier, articles, metrics)
        .expect("pipeline")
}

pub fn new_metrics() -> Arc<CrawlMetrics> {
    Arc::new(CrawlMetrics::new().expect("metrics"))
}

/// HTML page made of the given anchors
pub fn listing_page(hrefs: &[&str]) -> String {
    let anchors: String = hrefs
        .iter()
        .map(|href| format!(r#"<li><a href="{href}">{href}</a></li>"#))
        .collect();
    format!("<!DOCTYPE html><html><body><ul>{anchors}</ul></body></html>")
}

/// arXiv-like abstract page
pub fn abstract_page(title: &str, authors: &[&str], abstract_text: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
  <div id="abs">
    <h1 class="title mathjax">{title}</h1>
    <div class="authors">{}</div>
    <blockquote class="abstract mathjax">
      {abstract_text}
    </blockquote>
    <a href="/list/cs.AI">Back to listing</a>
    <a href="/pdf/2104.00001">Download PDF</a>
  </div>
</body>
</html>"#,
        authors.join(", ")
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

/// Mount a small site: a root, one listing, two articles and one page whose
/// id is too short. Binary assets must never be requested.
pub async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(listing_page(&[
            "/list/cs.AI",
            "/abs/2104.00001",
            "/pdf/2104.00001",
            "https://example.com/abs/9999.00001",
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/list/cs.AI"))
        .respond_with(html(listing_page(&[
            "/abs/2104.00001",
            "/abs/2104.00002",
            "/abs/xy",
            "/ps/2104.00002",
            "/",
        ])))
        .mount(server)
        .await;

    mount_article(server, "2104.00002", "Graph Networks", &["Alan Turing"]).await;
    mount_article(server, "xy", "Short Id", &["Nobody"]).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/(pdf|ps)/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

/// Mount an abstract page at `/abs/{id}`
pub async fn mount_article(server: &MockServer, id: &str, title: &str, authors: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/abs/{id}")))
        .respond_with(html(abstract_page(title, authors, "We study things.")))
        .mount(server)
        .await;
}

/// Mount the first article; `times` limits how often this version is served
pub async fn mount_first_article(server: &MockServer, title: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/abs/2104.00001"))
        .respond_with(html(abstract_page(
            title,
            &["Ada Lovelace", "Grace Hopper"],
            "We study attention.",
        )));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}
