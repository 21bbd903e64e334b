//! Concurrent crawl pipeline
//!
//! This module wires the stages together with bounded tokio::mpsc channels
//! and supervises them until the crawl goal is met, the frontier runs dry or
//! a stage fails.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │   URL    │──▶│ Fetcher  │──▶│  Parser  │──▶│ Link Sink │──▶ Frontier Store
//! │  Source  │   │ Workers  │   │ Workers  │   └───────────┘
//! └──────────┘   └──────────┘   └──────────┘   ┌──────────────┐
//!      ▲                             └────────▶│ Article Sink │──▶ Article Store
//!      │                                       └──────────────┘
//!  Frontier Store          all stages ──▶ JobResult collector ──▶ PipelineStats
//! ```
//!
//! Every channel holds at most `channel_capacity` messages, so a slow stage
//! throttles the stages feeding it. One [`CancellationToken`] is shared by
//! all workers: it fires on goal completion, on the first stage error and on
//! external interruption, and every worker exits at its next blocking point.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unarxiv::crawler::pipeline::{CrawlerPipeline, PipelineConfig};
//! use unarxiv::metrics::CrawlMetrics;
//! use unarxiv::models::CrawlConfiguration;
//! use unarxiv::storage::Database;
//!
//! # async fn example() -> unarxiv::Result<()> {
//! let db = Database::open("data/unarxiv.db")?;
//! let metrics = Arc::new(CrawlMetrics::new()?);
//! let pipeline = CrawlerPipeline::new(
//!     PipelineConfig::default(),
//!     Arc::new(db.frontier()),
//!     Arc::new(db.articles()),
//!     metrics,
//! )?;
//!
//! let report = pipeline
//!     .crawl_articles(&CrawlConfiguration::new("https://arxiv.org/", 100))
//!     .await?;
//! println!("{:?}: {} articles inserted", report.outcome, report.stats.articles_inserted);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::fetcher::PageFetcher;
use super::inflight::{InFlight, Ticket};
use super::stages::{self, StageContext, StageExit, StageKind, UrlSource};
use super::upsert::{ArticleUpserter, UpsertOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::CrawlMetrics;
use crate::models::{ArticleRecord, CrawlConfiguration, FetchedPage};
use crate::parser::PageParser;
use crate::storage::{ArticleStore, FrontierStore};

// ============================================================================
// Configuration
// ============================================================================

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of fetcher workers
    pub fetcher_workers: usize,

    /// Number of parser workers
    pub parser_workers: usize,

    /// Number of link sink workers
    pub link_sink_workers: usize,

    /// Number of article sink workers
    pub article_sink_workers: usize,

    /// Capacity of every inter-stage channel
    pub channel_capacity: usize,

    /// Requests per second shared by all fetchers
    pub requests_per_second: u32,

    /// Request timeout
    pub request_timeout: Duration,

    /// Backoff of the URL source when the frontier has nothing unvisited
    pub poll_interval: Duration,

    /// Maximum URLs read from the frontier per poll
    pub claim_batch_size: usize,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            fetcher_workers: crawler.fetcher_workers,
            parser_workers: crawler.parser_workers,
            link_sink_workers: crawler.link_sink_workers,
            article_sink_workers: crawler.article_sink_workers,
            channel_capacity: crawler.channel_capacity,
            requests_per_second: crawler.requests_per_second,
            request_timeout: config.request_timeout(),
            poll_interval: config.poll_interval(),
            claim_batch_size: crawler.claim_batch_size,
            user_agent: crawler.user_agent.clone(),
        }
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Message from URL source to Fetcher
#[derive(Debug)]
pub struct FetchJob {
    /// URL to fetch, as stored in the frontier
    pub url: String,

    /// Job ID for tracking
    pub job_id: u64,

    pub(crate) ticket: Ticket,
}

/// Message from Fetcher to Parser
#[derive(Debug)]
pub struct ParseJob {
    pub job_id: u64,
    pub page: FetchedPage,
    pub(crate) ticket: Ticket,
}

/// Message from Parser to Link Sink
#[derive(Debug)]
pub struct LinkJob {
    /// Normalised, in-domain URL
    pub url: String,
    /// Held until the link is enqueued
    pub(crate) _ticket: Ticket,
}

/// Message from Parser to Article Sink
#[derive(Debug)]
pub struct StoreJob {
    pub job_id: u64,
    pub article: ArticleRecord,
    /// Held until the article is upserted
    pub(crate) _ticket: Ticket,
}

/// Per-item outcome reported to the result collector
#[derive(Debug, Clone)]
pub enum JobResult {
    /// Article page went through the upsert engine
    Success {
        job_id: u64,
        article_id: String,
        outcome: UpsertOutcome,
    },
    /// Non-article page parsed and its links forwarded
    Parsed { job_id: u64, url: String },
    /// Page fetched but not ingested (status, missing title, short id, ...)
    Skipped {
        job_id: u64,
        url: String,
        reason: String,
    },
    /// No response could be obtained
    Failed {
        job_id: u64,
        url: String,
        error: String,
    },
}

// ============================================================================
// Pipeline Statistics
// ============================================================================

/// Pipeline statistics (thread-safe)
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// URLs claimed and dispatched to the fetchers
    pub dispatched: AtomicU64,

    /// Responses received, any status
    pub fetched: AtomicU64,

    /// Total bytes fetched
    pub bytes_fetched: AtomicU64,

    /// Crawlable links forwarded to the link sink
    pub links_discovered: AtomicU64,

    pub parsed_count: AtomicU64,
    pub articles_inserted: AtomicU64,
    pub articles_modified: AtomicU64,
    pub articles_unchanged: AtomicU64,
    pub skipped_count: AtomicU64,
    pub failed_count: AtomicU64,
}

impl PipelineStats {
    /// Create new stats counter
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received response and its size
    pub fn record_fetch(&self, bytes: u64) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_links(&self, count: u64) {
        self.links_discovered.fetch_add(count, Ordering::Relaxed);
    }

    /// Fold one per-item result into the counters
    pub fn record_result(&self, result: &JobResult) {
        let counter = match result {
            JobResult::Success { outcome, .. } => match outcome {
                UpsertOutcome::Inserted => &self.articles_inserted,
                UpsertOutcome::Modified => &self.articles_modified,
                UpsertOutcome::Unchanged => &self.articles_unchanged,
            },
            JobResult::Parsed { .. } => &self.parsed_count,
            JobResult::Skipped { .. } => &self.skipped_count,
            JobResult::Failed { .. } => &self.failed_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            links_discovered: self.links_discovered.load(Ordering::Relaxed),
            parsed_count: self.parsed_count.load(Ordering::Relaxed),
            articles_inserted: self.articles_inserted.load(Ordering::Relaxed),
            articles_modified: self.articles_modified.load(Ordering::Relaxed),
            articles_unchanged: self.articles_unchanged.load(Ordering::Relaxed),
            skipped_count: self.skipped_count.load(Ordering::Relaxed),
            failed_count: self.failed_count.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub dispatched: u64,
    pub fetched: u64,
    pub bytes_fetched: u64,
    pub links_discovered: u64,
    pub parsed_count: u64,
    pub articles_inserted: u64,
    pub articles_modified: u64,
    pub articles_unchanged: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
}

impl StatsSnapshot {
    /// Articles actually written to the store
    pub fn articles_written(&self) -> u64 {
        self.articles_inserted + self.articles_modified
    }

    /// Items that reached a terminal result
    pub fn completed(&self) -> u64 {
        self.parsed_count
            + self.articles_inserted
            + self.articles_modified
            + self.articles_unchanged
            + self.skipped_count
            + self.failed_count
    }
}

async fn collect_results(mut results: mpsc::Receiver<JobResult>, stats: Arc<PipelineStats>) {
    while let Some(result) = results.recv().await {
        stats.record_result(&result);
        match &result {
            JobResult::Success {
                job_id,
                article_id,
                outcome,
            } => {
                tracing::debug!(job_id, article_id, outcome = outcome.as_str(), "Job completed");
            }
            JobResult::Parsed { job_id, url } => {
                tracing::trace!(job_id, url, "Page parsed");
            }
            JobResult::Skipped {
                job_id,
                url,
                reason,
            } => {
                tracing::debug!(job_id, url, reason, "Job skipped");
            }
            JobResult::Failed { job_id, url, error } => {
                tracing::warn!(job_id, url, error, "Job failed");
            }
        }
    }
}

// ============================================================================
// Pipeline Implementation
// ============================================================================

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    /// Goal met or frontier exhausted; stages are winding down
    Draining,
    /// A stage failed; stages are winding down
    Failed,
    Stopped,
}

/// Why a crawl ended successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    GoalReached,
    FrontierExhausted,
}

/// Result of one `crawl_articles` invocation
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub outcome: CrawlOutcome,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

/// Orchestrator of the crawl stages
///
/// A pipeline runs one crawl at a time; invoke [`crawl_articles`](Self::crawl_articles)
/// again for the next round.
pub struct CrawlerPipeline {
    config: PipelineConfig,
    frontier: Arc<dyn FrontierStore>,
    articles: Arc<dyn ArticleStore>,
    metrics: Arc<CrawlMetrics>,
    fetcher: Arc<PageFetcher>,
    state: Arc<watch::Sender<PipelineState>>,
}

impl CrawlerPipeline {
    /// Create a new pipeline over the given stores
    pub fn new(
        config: PipelineConfig,
        frontier: Arc<dyn FrontierStore>,
        articles: Arc<dyn ArticleStore>,
        metrics: Arc<CrawlMetrics>,
    ) -> Result<Self> {
        if config.fetcher_workers == 0
            || config.parser_workers == 0
            || config.link_sink_workers == 0
            || config.article_sink_workers == 0
        {
            return Err(Error::config("every stage needs at least one worker"));
        }
        if config.channel_capacity == 0 {
            return Err(Error::config("channel_capacity must be greater than 0"));
        }
        if config.claim_batch_size == 0 {
            return Err(Error::config("claim_batch_size must be greater than 0"));
        }

        let fetcher = PageFetcher::new(
            config.requests_per_second,
            config.request_timeout,
            &config.user_agent,
        )?;
        let (state, _) = watch::channel(PipelineState::Idle);

        Ok(Self {
            config,
            frontier,
            articles,
            metrics,
            fetcher: Arc::new(fetcher),
            state: Arc::new(state),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current orchestrator state
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch orchestrator state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Run one crawl, cancelling it on Ctrl-C
    ///
    /// Returns once every stage has stopped. `Ok` means the goal was met or
    /// the frontier ran dry; any error means the crawl should be retried.
    pub async fn crawl_articles(&self, crawl: &CrawlConfiguration) -> Result<CrawlReport> {
        let shutdown = CancellationToken::new();

        let interrupt = shutdown.clone();
        let listener = tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        tracing::warn!("Interrupt received, cancelling crawl");
                        interrupt.cancel();
                    }
                }
                _ = interrupt.cancelled() => {}
            }
        });

        let result = self.crawl_articles_with_cancel(crawl, shutdown.clone()).await;

        shutdown.cancel();
        let _ = listener.await;
        result
    }

    /// Run one crawl that stops early when `shutdown` is cancelled
    ///
    /// An external cancellation before the goal is met yields
    /// [`Error::Cancelled`].
    pub async fn crawl_articles_with_cancel(
        &self,
        crawl: &CrawlConfiguration,
        shutdown: CancellationToken,
    ) -> Result<CrawlReport> {
        let started = Instant::now();
        self.state.send_replace(PipelineState::Running);

        tracing::info!(
            root_url = %crawl.root_url,
            desired = crawl.desired_article_count,
            fetcher_workers = self.config.fetcher_workers,
            parser_workers = self.config.parser_workers,
            link_sink_workers = self.config.link_sink_workers,
            article_sink_workers = self.config.article_sink_workers,
            "Starting crawler pipeline"
        );

        if let Err(e) = self.frontier.enqueue(&crawl.root_url).await {
            tracing::error!(error = %e, "Failed to seed frontier");
            self.state.send_replace(PipelineState::Failed);
            self.state.send_replace(PipelineState::Stopped);
            return Err(e.into());
        }

        let cancel = shutdown.child_token();
        let stats = PipelineStats::new();
        let inflight = InFlight::new();
        let capacity = self.config.channel_capacity;

        // Create channels
        let (fetch_tx, fetch_rx) = mpsc::channel::<FetchJob>(capacity);
        let (parse_tx, parse_rx) = mpsc::channel::<ParseJob>(capacity);
        let (link_tx, link_rx) = mpsc::channel::<LinkJob>(capacity);
        let (store_tx, store_rx) = mpsc::channel::<StoreJob>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<JobResult>(capacity);

        let collector = tokio::spawn(collect_results(result_rx, Arc::clone(&stats)));

        let ctx = StageContext {
            cancel: cancel.clone(),
            stats: Arc::clone(&stats),
            results: result_tx,
            metrics: Arc::clone(&self.metrics),
            state: Arc::clone(&self.state),
        };

        let mut stage_set: JoinSet<(StageKind, Result<StageExit>)> = JoinSet::new();

        let source = UrlSource {
            frontier: Arc::clone(&self.frontier),
            articles: Arc::clone(&self.articles),
            inflight: inflight.clone(),
            desired_article_count: crawl.desired_article_count,
            poll_interval: self.config.poll_interval,
            claim_batch_size: self.config.claim_batch_size,
        };
        {
            let ctx = ctx.clone();
            stage_set.spawn(async move { (StageKind::UrlSource, source.run(ctx, fetch_tx).await) });
        }

        let fetch_rx = Arc::new(Mutex::new(fetch_rx));
        for worker_id in 0..self.config.fetcher_workers {
            let ctx = ctx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let frontier = Arc::clone(&self.frontier);
            let input = Arc::clone(&fetch_rx);
            let out = parse_tx.clone();
            stage_set.spawn(async move {
                let exit = stages::run_fetcher(worker_id, ctx, fetcher, frontier, input, out).await;
                (StageKind::Fetcher, exit)
            });
        }
        drop(parse_tx);

        let parse_rx = Arc::new(Mutex::new(parse_rx));
        let parser = PageParser::new(crawl.root_url.clone());
        for worker_id in 0..self.config.parser_workers {
            let ctx = ctx.clone();
            let parser = parser.clone();
            let input = Arc::clone(&parse_rx);
            let links_out = link_tx.clone();
            let articles_out = store_tx.clone();
            stage_set.spawn(async move {
                let exit =
                    stages::run_parser(worker_id, ctx, parser, input, links_out, articles_out)
                        .await;
                (StageKind::Parser, exit)
            });
        }
        drop(link_tx);
        drop(store_tx);

        let link_rx = Arc::new(Mutex::new(link_rx));
        for worker_id in 0..self.config.link_sink_workers {
            let ctx = ctx.clone();
            let frontier = Arc::clone(&self.frontier);
            let input = Arc::clone(&link_rx);
            stage_set.spawn(async move {
                let exit = stages::run_link_sink(worker_id, ctx, frontier, input).await;
                (StageKind::LinkSink, exit)
            });
        }

        let store_rx = Arc::new(Mutex::new(store_rx));
        let upserter = ArticleUpserter::new(Arc::clone(&self.articles), Arc::clone(&self.metrics));
        for worker_id in 0..self.config.article_sink_workers {
            let ctx = ctx.clone();
            let upserter = upserter.clone();
            let input = Arc::clone(&store_rx);
            stage_set.spawn(async move {
                let exit = stages::run_article_sink(worker_id, ctx, upserter, input).await;
                (StageKind::ArticleSink, exit)
            });
        }

        // Workers hold the only remaining result senders
        drop(ctx);

        let mut first_error: Option<Error> = None;
        let mut outcome: Option<CrawlOutcome> = None;

        while let Some(joined) = stage_set.join_next().await {
            match joined {
                Ok((kind, Ok(exit))) => {
                    match exit {
                        StageExit::GoalReached => outcome = Some(CrawlOutcome::GoalReached),
                        StageExit::FrontierExhausted => {
                            outcome = Some(CrawlOutcome::FrontierExhausted)
                        }
                        StageExit::Cancelled | StageExit::ChannelClosed => {}
                    }
                    tracing::debug!(stage = kind.as_str(), exit = ?exit, "Stage stopped");
                    self.state.send_if_modified(|state| {
                        let running = *state == PipelineState::Running;
                        if running {
                            *state = PipelineState::Draining;
                        }
                        running
                    });
                }
                Ok((kind, Err(e))) => {
                    tracing::error!(stage = kind.as_str(), error = %e, "Stage failed");
                    if first_error.is_none() {
                        self.state.send_replace(PipelineState::Failed);
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Stage task aborted");
                    if first_error.is_none() {
                        self.state.send_replace(PipelineState::Failed);
                        first_error = Some(Error::with_source("stage task aborted", e));
                    }
                }
            }
            cancel.cancel();
        }

        let _ = collector.await;
        self.state.send_replace(PipelineState::Stopped);

        let snapshot = stats.snapshot();
        let elapsed = started.elapsed();
        tracing::info!(
            dispatched = snapshot.dispatched,
            inserted = snapshot.articles_inserted,
            modified = snapshot.articles_modified,
            unchanged = snapshot.articles_unchanged,
            skipped = snapshot.skipped_count,
            failed = snapshot.failed_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Pipeline completed"
        );

        if let Some(e) = first_error {
            return Err(e);
        }

        match outcome {
            Some(outcome) => Ok(CrawlReport {
                outcome,
                stats: snapshot,
                elapsed,
            }),
            None => Err(Error::Cancelled),
        }
    }
}

// ============================================================================
// Pipeline Builder
// ============================================================================

/// Builder for CrawlerPipeline
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Start from an application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: PipelineConfig::from(config),
        }
    }

    /// Set number of fetcher workers
    pub fn fetcher_workers(mut self, count: usize) -> Self {
        self.config.fetcher_workers = count;
        self
    }

    /// Set number of parser workers
    pub fn parser_workers(mut self, count: usize) -> Self {
        self.config.parser_workers = count;
        self
    }

    pub fn link_sink_workers(mut self, count: usize) -> Self {
        self.config.link_sink_workers = count;
        self
    }

    pub fn article_sink_workers(mut self, count: usize) -> Self {
        self.config.article_sink_workers = count;
        self
    }

    /// Set channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set requests per second
    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.config.requests_per_second = rps;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the frontier poll backoff
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn claim_batch_size(mut self, size: usize) -> Self {
        self.config.claim_batch_size = size;
        self
    }

    /// Build the pipeline
    pub fn build(
        self,
        frontier: Arc<dyn FrontierStore>,
        articles: Arc<dyn ArticleStore>,
        metrics: Arc<CrawlMetrics>,
    ) -> Result<CrawlerPipeline> {
        CrawlerPipeline::new(self.config, frontier, articles, metrics)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
