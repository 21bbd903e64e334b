//! Crawl pipeline stages and their orchestration
//!
//! - [`fetcher`] - rate-limited HTTP GET
//! - [`inflight`] - accounting of dispatched-but-unfinished work
//! - [`upsert`] - change-aware article writes
//! - [`stages`] - the worker loops
//! - [`pipeline`] - channel wiring, supervision and termination

pub mod fetcher;
pub mod inflight;
pub mod pipeline;
pub mod stages;
pub mod upsert;

pub use fetcher::PageFetcher;
pub use inflight::{InFlight, Ticket};
pub use pipeline::{
    CrawlOutcome, CrawlReport, CrawlerPipeline, JobResult, PipelineBuilder, PipelineConfig,
    PipelineState, PipelineStats, StatsSnapshot,
};
pub use stages::{StageExit, StageKind};
pub use upsert::{ArticleUpserter, UpsertOutcome};
