//! Stage worker loops
//!
//! Every worker returns a [`StageExit`] on an orderly stop or an error when
//! the crawl cannot go on (store failures). Each blocking point (channel
//! receive, channel send, frontier backoff, HTTP call, store call) is raced
//! against the shared cancellation token.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::fetcher::PageFetcher;
use super::inflight::InFlight;
use super::pipeline::{
    FetchJob, JobResult, LinkJob, ParseJob, PipelineState, PipelineStats, StoreJob,
};
use super::upsert::ArticleUpserter;
use crate::error::{Result, UnarxivErrorTrait};
use crate::metrics::CrawlMetrics;
use crate::parser::PageParser;
use crate::storage::{ArticleStore, FrontierStore};
use crate::utils::now_nanos;

/// Receiver shared by all workers of one stage
pub(crate) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Which stage a worker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    UrlSource,
    Fetcher,
    Parser,
    LinkSink,
    ArticleSink,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlSource => "url_source",
            Self::Fetcher => "fetcher",
            Self::Parser => "parser",
            Self::LinkSink => "link_sink",
            Self::ArticleSink => "article_sink",
        }
    }
}

/// Why a worker stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExit {
    /// The shared token was cancelled
    Cancelled,
    /// A neighbouring stage went away
    ChannelClosed,
    /// The article store holds the desired count and in-flight work drained
    GoalReached,
    /// No unvisited URL is left and nothing is in flight
    FrontierExhausted,
}

/// Handles every worker shares
#[derive(Clone)]
pub(crate) struct StageContext {
    pub cancel: CancellationToken,
    pub stats: Arc<PipelineStats>,
    pub results: mpsc::Sender<JobResult>,
    pub metrics: Arc<CrawlMetrics>,
    pub state: Arc<watch::Sender<PipelineState>>,
}

impl StageContext {
    fn stopped(&self) -> StageExit {
        if self.cancel.is_cancelled() {
            StageExit::Cancelled
        } else {
            StageExit::ChannelClosed
        }
    }

    async fn report(&self, result: JobResult) {
        // The collector drains until every sender is gone, so this never stalls
        let _ = self.results.send(result).await;
    }
}

enum Next<T> {
    Item(T),
    Closed,
    Cancelled,
}

async fn recv_or_cancel<T>(rx: &Mutex<mpsc::Receiver<T>>, cancel: &CancellationToken) -> Next<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Next::Cancelled,
        item = async { rx.lock().await.recv().await } => match item {
            Some(item) => Next::Item(item),
            None => Next::Closed,
        },
    }
}

/// `false` when the item could not be delivered (cancelled or receiver gone)
async fn send_or_cancel<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

// ============================================================================
// URL Source
// ============================================================================

pub(crate) struct UrlSource {
    pub frontier: Arc<dyn FrontierStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub inflight: InFlight,
    pub desired_article_count: u64,
    pub poll_interval: Duration,
    pub claim_batch_size: usize,
}

impl UrlSource {
    /// Poll the frontier, claim URLs and dispatch them until the goal is
    /// reached, the frontier runs dry or the crawl is cancelled
    pub async fn run(self, ctx: StageContext, out: mpsc::Sender<FetchJob>) -> Result<StageExit> {
        let mut batch: VecDeque<String> = VecDeque::new();
        let mut job_id: u64 = 0;

        tracing::info!(
            desired = self.desired_article_count,
            "URL source started"
        );

        loop {
            if ctx.cancel.is_cancelled() {
                return Ok(StageExit::Cancelled);
            }

            let stored = self.articles.count().await?;
            if stored >= self.desired_article_count {
                tracing::info!(
                    stored,
                    desired = self.desired_article_count,
                    in_flight = self.inflight.count(),
                    "Desired article count reached, draining"
                );
                ctx.state.send_replace(PipelineState::Draining);

                tokio::select! {
                    _ = ctx.cancel.cancelled() => return Ok(StageExit::Cancelled),
                    _ = self.inflight.wait_idle() => return Ok(StageExit::GoalReached),
                }
            }

            let Some(url) = batch.pop_front() else {
                // Read idleness before querying: in-flight work finishing
                // after this point may add URLs the query does not see.
                let idle = self.inflight.is_idle();
                let next = self.frontier.claim_next_unvisited(self.claim_batch_size).await?;

                if next.is_empty() {
                    if idle {
                        tracing::info!("Frontier exhausted");
                        ctx.state.send_replace(PipelineState::Draining);
                        return Ok(StageExit::FrontierExhausted);
                    }

                    tracing::trace!(in_flight = self.inflight.count(), "No unvisited URL, backing off");
                    tokio::select! {
                        _ = ctx.cancel.cancelled() => return Ok(StageExit::Cancelled),
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }

                batch.extend(next);
                continue;
            };

            let ticket = self.inflight.ticket();
            self.frontier.claim(&url).await?;

            job_id += 1;
            ctx.stats.record_dispatch();
            tracing::debug!(job_id, url = %url, "Dispatching");

            let job = FetchJob {
                url,
                job_id,
                ticket,
            };
            if !send_or_cancel(&out, job, &ctx.cancel).await {
                return Ok(ctx.stopped());
            }
        }
    }
}

// ============================================================================
// Fetcher
// ============================================================================

pub(crate) async fn run_fetcher(
    worker_id: usize,
    ctx: StageContext,
    fetcher: Arc<PageFetcher>,
    frontier: Arc<dyn FrontierStore>,
    input: SharedReceiver<FetchJob>,
    out: mpsc::Sender<ParseJob>,
) -> Result<StageExit> {
    tracing::debug!(worker_id, "Fetcher worker started");

    loop {
        let job = match recv_or_cancel(&input, &ctx.cancel).await {
            Next::Item(job) => job,
            Next::Closed => return Ok(StageExit::ChannelClosed),
            Next::Cancelled => return Ok(StageExit::Cancelled),
        };

        // The visit is timed from the request, not from the rate limiter
        let fetched = tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(StageExit::Cancelled),
            fetched = async {
                fetcher.until_ready().await;
                let started = Instant::now();
                fetcher.get(&job.url).await.map(|page| (page, started.elapsed()))
            } => fetched,
        };

        let page = match fetched {
            Ok((page, elapsed)) => {
                ctx.metrics.record_visit(elapsed);
                page
            }
            Err(e) => {
                frontier.mark_visited(&job.url, None, now_nanos()).await?;
                tracing::warn!(
                    worker_id,
                    job_id = job.job_id,
                    url = %job.url,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Fetch failed, skipping URL"
                );
                ctx.report(JobResult::Failed {
                    job_id: job.job_id,
                    url: job.url,
                    error: e.to_string(),
                })
                .await;
                continue;
            }
        };

        frontier
            .mark_visited(&job.url, Some(page.status_code), now_nanos())
            .await?;
        ctx.stats.record_fetch(page.body.len() as u64);

        let parse_job = ParseJob {
            job_id: job.job_id,
            page,
            ticket: job.ticket,
        };
        if !send_or_cancel(&out, parse_job, &ctx.cancel).await {
            return Ok(ctx.stopped());
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

pub(crate) async fn run_parser(
    worker_id: usize,
    ctx: StageContext,
    parser: PageParser,
    input: SharedReceiver<ParseJob>,
    links_out: mpsc::Sender<LinkJob>,
    articles_out: mpsc::Sender<StoreJob>,
) -> Result<StageExit> {
    tracing::debug!(worker_id, "Parser worker started");

    loop {
        let job = match recv_or_cancel(&input, &ctx.cancel).await {
            Next::Item(job) => job,
            Next::Closed => return Ok(StageExit::ChannelClosed),
            Next::Cancelled => return Ok(StageExit::Cancelled),
        };

        let parsed = parser.parse(&job.page, now_nanos());
        let success = job.page.is_success();
        let status = job.page.status_code;
        let url = job.page.request_url;
        ctx.stats.record_links(parsed.links.len() as u64);

        if parsed.skipped_anchors > 0 {
            tracing::debug!(url = %url, skipped = parsed.skipped_anchors, "Anchors without href skipped");
        }

        for link in parsed.links {
            let link_job = LinkJob {
                url: link,
                _ticket: job.ticket.clone(),
            };
            if !send_or_cancel(&links_out, link_job, &ctx.cancel).await {
                return Ok(ctx.stopped());
            }
        }

        if !success {
            tracing::debug!(worker_id, url = %url, status, "Non-success status, links kept");
            ctx.report(JobResult::Skipped {
                job_id: job.job_id,
                url,
                reason: format!("HTTP status {status}"),
            })
            .await;
            continue;
        }

        match parsed.article {
            None => {
                ctx.report(JobResult::Parsed {
                    job_id: job.job_id,
                    url,
                })
                .await;
            }
            Some(Ok(article)) => {
                let store_job = StoreJob {
                    job_id: job.job_id,
                    article,
                    _ticket: job.ticket,
                };
                if !send_or_cancel(&articles_out, store_job, &ctx.cancel).await {
                    return Ok(ctx.stopped());
                }
            }
            Some(Err(e)) => {
                tracing::debug!(worker_id, url = %url, error = %e, "Page not ingested");
                ctx.report(JobResult::Skipped {
                    job_id: job.job_id,
                    url,
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

pub(crate) async fn run_link_sink(
    worker_id: usize,
    ctx: StageContext,
    frontier: Arc<dyn FrontierStore>,
    input: SharedReceiver<LinkJob>,
) -> Result<StageExit> {
    tracing::debug!(worker_id, "Link sink worker started");

    loop {
        let job = match recv_or_cancel(&input, &ctx.cancel).await {
            Next::Item(job) => job,
            Next::Closed => return Ok(StageExit::ChannelClosed),
            Next::Cancelled => return Ok(StageExit::Cancelled),
        };

        tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(StageExit::Cancelled),
            enqueued = frontier.enqueue(&job.url) => enqueued?,
        }
        tracing::trace!(url = %job.url, "Enqueued");
    }
}

pub(crate) async fn run_article_sink(
    worker_id: usize,
    ctx: StageContext,
    upserter: ArticleUpserter,
    input: SharedReceiver<StoreJob>,
) -> Result<StageExit> {
    tracing::debug!(worker_id, "Article sink worker started");

    loop {
        let job = match recv_or_cancel(&input, &ctx.cancel).await {
            Next::Item(job) => job,
            Next::Closed => return Ok(StageExit::ChannelClosed),
            Next::Cancelled => return Ok(StageExit::Cancelled),
        };

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => return Ok(StageExit::Cancelled),
            outcome = upserter.upsert(&job.article) => outcome?,
        };

        ctx.report(JobResult::Success {
            job_id: job.job_id,
            article_id: job.article.id,
            outcome,
        })
        .await;
    }
}
