//! Configuration management for the unarxiv crawler
//!
//! This module handles loading and validating the application configuration
//! from environment variables and TOML files. The crawl target itself
//! (root URL, desired article count) comes from a [`ConfigProvider`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::CrawlConfiguration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Metrics exporter configuration
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Scheduler loop configuration
    pub schedule: ScheduleConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
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

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Rate limit shared by all fetchers (requests per second)
    pub requests_per_second: u32,

    /// Backoff between frontier polls when no unvisited URL is available
    pub poll_interval_ms: u64,

    /// Maximum URLs pulled from the frontier per poll
    pub claim_batch_size: usize,

    /// User agent string
    pub user_agent: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics` while crawling
    pub enabled: bool,

    /// Listen address of the exporter
    pub listen_addr: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds to sleep between crawl invocations
    pub interval_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            crawler: CrawlerConfig {
                fetcher_workers: env_or("UNARXIV_FETCHER_WORKERS", defaults.crawler.fetcher_workers),
                parser_workers: env_or("UNARXIV_PARSER_WORKERS", defaults.crawler.parser_workers),
                link_sink_workers: env_or(
                    "UNARXIV_LINK_SINK_WORKERS",
                    defaults.crawler.link_sink_workers,
                ),
                article_sink_workers: env_or(
                    "UNARXIV_ARTICLE_SINK_WORKERS",
                    defaults.crawler.article_sink_workers,
                ),
                channel_capacity: env_or(
                    "UNARXIV_CHANNEL_CAPACITY",
                    defaults.crawler.channel_capacity,
                ),
                request_timeout_secs: env_or(
                    "UNARXIV_REQUEST_TIMEOUT",
                    defaults.crawler.request_timeout_secs,
                ),
                requests_per_second: env_or(
                    "UNARXIV_RATE_LIMIT",
                    defaults.crawler.requests_per_second,
                ),
                poll_interval_ms: env_or(
                    "UNARXIV_POLL_INTERVAL_MS",
                    defaults.crawler.poll_interval_ms,
                ),
                claim_batch_size: env_or(
                    "UNARXIV_CLAIM_BATCH_SIZE",
                    defaults.crawler.claim_batch_size,
                ),
                user_agent: std::env::var("UNARXIV_USER_AGENT")
                    .unwrap_or(defaults.crawler.user_agent),
            },
            database: DatabaseConfig {
                sqlite_path: std::env::var("UNARXIV_SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.database.sqlite_path),
            },
            metrics: MetricsConfig {
                enabled: env_or("UNARXIV_METRICS_ENABLED", defaults.metrics.enabled),
                listen_addr: std::env::var("UNARXIV_METRICS_ADDR")
                    .unwrap_or(defaults.metrics.listen_addr),
            },
            logging: LoggingConfig {
                level: std::env::var("UNARXIV_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: std::env::var("UNARXIV_LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
            schedule: ScheduleConfig {
                interval_secs: env_or("UNARXIV_INTERVAL_SECS", defaults.schedule.interval_secs),
            },
        };

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let crawler = &self.crawler;

        if crawler.fetcher_workers == 0 || crawler.parser_workers == 0 {
            anyhow::bail!("fetcher_workers and parser_workers must be greater than 0");
        }

        if crawler.link_sink_workers == 0 || crawler.article_sink_workers == 0 {
            anyhow::bail!("link_sink_workers and article_sink_workers must be greater than 0");
        }

        if crawler.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be greater than 0");
        }

        if crawler.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if crawler.claim_batch_size == 0 {
            anyhow::bail!("claim_batch_size must be greater than 0");
        }

        if crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.schedule.interval_secs == 0 {
            anyhow::bail!("schedule interval_secs must be greater than 0");
        }

        if self.metrics.enabled {
            self.metrics_addr()?;
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    /// Get frontier poll backoff as Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.crawler.poll_interval_ms)
    }

    /// Get the scheduler interval as Duration
    #[must_use]
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }

    /// Parsed metrics listen address
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.metrics
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid metrics listen address: {}", self.metrics.listen_addr))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig {
                fetcher_workers: 2,
                parser_workers: 2,
                link_sink_workers: 1,
                article_sink_workers: 1,
                channel_capacity: 10,
                request_timeout_secs: 30,
                requests_per_second: 1,
                poll_interval_ms: 1000,
                claim_batch_size: 100,
                user_agent: format!("unarxiv/{}", env!("CARGO_PKG_VERSION")),
            },
            database: DatabaseConfig {
                sqlite_path: PathBuf::from("data/unarxiv.db"),
            },
            metrics: MetricsConfig {
                enabled: true,
                listen_addr: String::from("0.0.0.0:8090"),
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
            schedule: ScheduleConfig { interval_secs: 60 },
        }
    }
}

// ============================================================================
// Crawl Configuration Provider
// ============================================================================

/// Source of the crawl target, read once per crawl invocation
///
/// Implementations return [`crate::error::Error::NoConfigs`] when no target
/// has been configured.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn crawl_configuration(&self) -> crate::error::Result<CrawlConfiguration>;
}

/// Provider returning a fixed configuration
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    configuration: Option<CrawlConfiguration>,
}

impl StaticConfigProvider {
    pub fn new(configuration: CrawlConfiguration) -> Self {
        Self {
            configuration: Some(configuration),
        }
    }

    /// Provider that has nothing configured
    pub fn empty() -> Self {
        Self {
            configuration: None,
        }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn crawl_configuration(&self) -> crate::error::Result<CrawlConfiguration> {
        self.configuration
            .clone()
            .ok_or(crate::error::Error::NoConfigs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_pipeline_shape() {
        let config = Config::default();
        assert_eq!(config.crawler.fetcher_workers, 2);
        assert_eq!(config.crawler.parser_workers, 2);
        assert_eq!(config.crawler.channel_capacity, 10);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_worker_counts() {
        let mut config = Config::default();
        config.crawler.fetcher_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crawler.article_sink_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_schedule_interval() {
        let mut config = Config::default();
        config.schedule.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_request_timeout() {
        let mut config = Config::default();
        config.crawler.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_metrics_addr() {
        let mut config = Config::default();
        config.metrics.listen_addr = "not an address".to_string();
        assert!(config.validate().is_err());

        config.metrics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.schedule_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.crawler.claim_batch_size, 100);
        assert_eq!(parsed.metrics.listen_addr, "0.0.0.0:8090");
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticConfigProvider::new(CrawlConfiguration::new("https://arxiv.org/", 5));
        let cfg = provider.crawl_configuration().await.unwrap();
        assert_eq!(cfg.desired_article_count, 5);

        let empty = StaticConfigProvider::empty();
        assert!(matches!(
            empty.crawl_configuration().await,
            Err(crate::error::Error::NoConfigs)
        ));
    }
}
