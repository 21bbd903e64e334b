//! unarxiv - concurrent crawler for arXiv-style article pages
//!
//! The crawler keeps a durable frontier of discovered URLs, fetches and
//! parses pages through a multi-stage pipeline and upserts article metadata
//! only when it changed.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and the crawl target provider
//! - [`crawler`] - Fetcher, stage workers, upsert engine and orchestrator
//! - [`parser`] - Link normalisation and article extraction
//! - [`models`] - Core data structures and types
//! - [`storage`] - SQLite and in-memory Frontier/Article stores
//! - [`metrics`] - Prometheus metrics and exporter
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unarxiv::config::{Config, ConfigProvider};
//! use unarxiv::crawler::{CrawlerPipeline, PipelineConfig};
//! use unarxiv::metrics::CrawlMetrics;
//! use unarxiv::storage::Database;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::open(&config.database.sqlite_path)?;
//!     let crawl = db.config_provider().crawl_configuration().await?;
//!
//!     let pipeline = CrawlerPipeline::new(
//!         PipelineConfig::from(&config),
//!         Arc::new(db.frontier()),
//!         Arc::new(db.articles()),
//!         Arc::new(CrawlMetrics::new()?),
//!     )?;
//!     pipeline.crawl_articles(&crawl).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigProvider, StaticConfigProvider};
    pub use crate::crawler::{CrawlOutcome, CrawlReport, CrawlerPipeline, PipelineConfig};
    pub use crate::error::{Error, ErrorCategory, Result, UnarxivErrorTrait};
    pub use crate::metrics::CrawlMetrics;
    pub use crate::models::{ArticleRecord, CrawlConfiguration, FetchedPage, FrontierEntry};
    pub use crate::storage::{ArticleStore, Database, FrontierStore};
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{ArticleRecord, CrawlConfiguration, FrontierEntry};
