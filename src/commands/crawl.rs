use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use unarxiv::config::{Config, ConfigProvider, StaticConfigProvider};
use unarxiv::crawler::{CrawlReport, CrawlerPipeline, PipelineConfig};
use unarxiv::metrics::{self, CrawlMetrics};
use unarxiv::models::CrawlConfiguration;
use unarxiv::storage::Database;
use unarxiv::Error;

/// Everything a crawl invocation needs, opened from the application config
struct CrawlContext {
    db: Database,
    pipeline: CrawlerPipeline,
    metrics: Arc<CrawlMetrics>,
}

impl CrawlContext {
    fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database.sqlite_path).with_context(|| {
            format!(
                "Failed to open database: {}",
                config.database.sqlite_path.display()
            )
        })?;
        let metrics = Arc::new(CrawlMetrics::new().context("Failed to register metrics")?);

        let pipeline = CrawlerPipeline::new(
            PipelineConfig::from(config),
            Arc::new(db.frontier()),
            Arc::new(db.articles()),
            Arc::clone(&metrics),
        )
        .context("Failed to create crawler pipeline")?;

        Ok(Self {
            db,
            pipeline,
            metrics,
        })
    }

    /// Serve `/metrics` in the background when enabled
    fn spawn_exporter(
        &self,
        config: &Config,
        shutdown: &CancellationToken,
    ) -> Result<Option<JoinHandle<()>>> {
        if !config.metrics.enabled {
            return Ok(None);
        }

        let addr = config.metrics_addr()?;
        let metrics = Arc::clone(&self.metrics);
        let shutdown = shutdown.clone();
        Ok(Some(tokio::spawn(async move {
            if let Err(e) = metrics::serve(addr, metrics, shutdown).await {
                tracing::error!(%addr, error = %e, "Metrics exporter stopped");
            }
        })))
    }
}

fn print_report(report: &CrawlReport) {
    let stats = &report.stats;
    println!("\nCrawl Summary");
    println!("=============");
    println!("Outcome: {:?}", report.outcome);
    println!("URLs dispatched: {}", stats.dispatched);
    println!("Responses: {} ({} bytes)", stats.fetched, stats.bytes_fetched);
    println!("Links discovered: {}", stats.links_discovered);
    println!(
        "Articles: {} inserted, {} modified, {} unchanged",
        stats.articles_inserted, stats.articles_modified, stats.articles_unchanged
    );
    println!("Skipped: {}", stats.skipped_count);
    println!("Failed: {}", stats.failed_count);
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
}

/// One crawl invocation
///
/// Uses `root_url`/`desired_count` when both are given, otherwise the
/// configuration stored in the database.
pub async fn crawl(
    config: Config,
    root_url: Option<String>,
    desired_count: Option<u64>,
) -> Result<()> {
    let ctx = CrawlContext::open(&config)?;

    let crawl = match (root_url, desired_count) {
        (Some(root_url), Some(desired)) => {
            StaticConfigProvider::new(CrawlConfiguration::new(root_url, desired))
                .crawl_configuration()
                .await?
        }
        (None, None) => ctx
            .db
            .config_provider()
            .crawl_configuration()
            .await
            .context("Run `unarxiv configure` or pass --root-url and --desired-count")?,
        _ => anyhow::bail!("--root-url and --desired-count must be given together"),
    };

    println!("Crawling {}", crawl.root_url);
    println!("Desired articles: {}", crawl.desired_article_count);

    let shutdown = CancellationToken::new();
    let exporter = ctx.spawn_exporter(&config, &shutdown)?;

    let result = ctx.pipeline.crawl_articles(&crawl).await;

    shutdown.cancel();
    if let Some(exporter) = exporter {
        let _ = exporter.await;
    }

    let report = result.context("Crawl did not complete")?;
    print_report(&report);
    Ok(())
}

/// Crawl on a fixed schedule until interrupted
///
/// Failed rounds are logged and retried on the next tick.
pub async fn run(config: Config) -> Result<()> {
    let ctx = CrawlContext::open(&config)?;
    let provider = ctx.db.config_provider();

    let shutdown = CancellationToken::new();
    let exporter = ctx.spawn_exporter(&config, &shutdown)?;

    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping scheduler");
            interrupt.cancel();
        }
    });

    let mut ticker = tokio::time::interval(config.schedule_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = config.schedule.interval_secs,
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let crawl = match provider.crawl_configuration().await {
            Ok(crawl) => crawl,
            Err(Error::NoConfigs) => {
                tracing::warn!("No crawler configuration, run `unarxiv configure`");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read crawler configuration");
                continue;
            }
        };

        match ctx
            .pipeline
            .crawl_articles_with_cancel(&crawl, shutdown.clone())
            .await
        {
            Ok(report) => {
                tracing::info!(
                    outcome = ?report.outcome,
                    inserted = report.stats.articles_inserted,
                    modified = report.stats.articles_modified,
                    "Crawl round finished"
                );
            }
            Err(Error::Cancelled) => break,
            Err(e) => {
                tracing::error!(error = %e, "Crawl round failed, retrying next tick");
            }
        }
    }

    shutdown.cancel();
    if let Some(exporter) = exporter {
        let _ = exporter.await;
    }

    tracing::info!("Scheduler stopped");
    Ok(())
}
