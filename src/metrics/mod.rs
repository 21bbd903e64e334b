//! Prometheus metrics for the crawl pipeline
//!
//! [`CrawlMetrics`] owns a private registry and is handed to the pipeline
//! explicitly. Recording is fire-and-forget: none of the `record_*` methods
//! can fail.
//!
//! # Usage
//!
//! ```ignore
//! let metrics = Arc::new(CrawlMetrics::new()?);
//! let pipeline = CrawlerPipeline::new(config, frontier, articles, Arc::clone(&metrics))?;
//! tokio::spawn(unarxiv::metrics::serve(addr, metrics, shutdown));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tokio_util::sync::CancellationToken;

/// Label value for articles written for the first time
pub const KIND_INSERTED: &str = "inserted";

/// Label value for articles overwritten because their content changed
pub const KIND_MODIFIED: &str = "modified";

/// Metrics recorded by one crawler process
pub struct CrawlMetrics {
    registry: Registry,
    urls_visited: IntCounter,
    articles_updated: IntCounterVec,
    url_visit_duration: Histogram,
}

impl CrawlMetrics {
    /// Create and register all crawler metrics in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let urls_visited = IntCounter::with_opts(Opts::new(
            "unarxiv_urls_visited_total",
            "Number of URLs visited by the crawler",
        ))?;

        let articles_updated = IntCounterVec::new(
            Opts::new(
                "unarxiv_articles_updated_total",
                "Number of articles written by the crawler",
            ),
            &["kind"],
        )?;

        let url_visit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "unarxiv_url_visit_duration_seconds",
                "Duration of a URL visit measured in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(urls_visited.clone()))?;
        registry.register(Box::new(articles_updated.clone()))?;
        registry.register(Box::new(url_visit_duration.clone()))?;

        Ok(Self {
            registry,
            urls_visited,
            articles_updated,
            url_visit_duration,
        })
    }

    /// Record a completed URL visit and its duration
    pub fn record_visit(&self, elapsed: Duration) {
        self.urls_visited.inc();
        self.url_visit_duration.observe(elapsed.as_secs_f64());
    }

    /// Record a first-time article insert
    pub fn record_inserted(&self) {
        self.articles_updated
            .with_label_values(&[KIND_INSERTED])
            .inc();
    }

    /// Record an overwrite of a changed article
    pub fn record_modified(&self) {
        self.articles_updated
            .with_label_values(&[KIND_MODIFIED])
            .inc();
    }

    pub fn urls_visited(&self) -> u64 {
        self.urls_visited.get()
    }

    pub fn articles_inserted(&self) -> u64 {
        self.articles_updated
            .with_label_values(&[KIND_INSERTED])
            .get()
    }

    pub fn articles_modified(&self) -> u64 {
        self.articles_updated
            .with_label_values(&[KIND_MODIFIED])
            .get()
    }

    /// Number of visit durations observed so far
    pub fn visit_samples(&self) -> u64 {
        self.url_visit_duration.get_sample_count()
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// ============================================================================
// Exporter
// ============================================================================

/// Serve `GET /metrics` until `shutdown` is cancelled
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<CrawlMetrics>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics exporter listening");

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn router(metrics: Arc<CrawlMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<CrawlMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_per_instance() {
        let a = CrawlMetrics::new().unwrap();
        let b = CrawlMetrics::new().unwrap();

        a.record_visit(Duration::from_millis(120));
        a.record_inserted();

        assert_eq!(a.urls_visited(), 1);
        assert_eq!(a.articles_inserted(), 1);
        assert_eq!(b.urls_visited(), 0);
        assert_eq!(b.articles_inserted(), 0);
    }

    #[test]
    fn test_counters() {
        let metrics = CrawlMetrics::new().unwrap();
        metrics.record_inserted();
        metrics.record_modified();
        metrics.record_modified();
        metrics.record_visit(Duration::from_secs(1));

        assert_eq!(metrics.articles_inserted(), 1);
        assert_eq!(metrics.articles_modified(), 2);
        assert_eq!(metrics.visit_samples(), 1);
    }

    #[test]
    fn test_encode_metrics() {
        let metrics = CrawlMetrics::new().unwrap();
        metrics.record_visit(Duration::from_millis(10));
        metrics.record_inserted();

        let text = metrics.encode().unwrap();
        assert!(text.contains("unarxiv_urls_visited_total 1"));
        assert!(text.contains("unarxiv_articles_updated_total{kind=\"inserted\"} 1"));
        assert!(text.contains("unarxiv_url_visit_duration_seconds_count 1"));
    }
}
