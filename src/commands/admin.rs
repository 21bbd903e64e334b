use anyhow::{Context, Result};
use serde::Serialize;

use unarxiv::config::Config;
use unarxiv::models::CrawlConfiguration;
use unarxiv::storage::{ArticleStore, Database, FrontierStore};

fn open_database(config: &Config) -> Result<Database> {
    Database::open(&config.database.sqlite_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database.sqlite_path.display()
        )
    })
}

/// Add URLs to the frontier
pub async fn seed(config: Config, urls: Vec<String>) -> Result<()> {
    let frontier = open_database(&config)?.frontier();

    for url in &urls {
        frontier
            .enqueue(url)
            .await
            .with_context(|| format!("Failed to enqueue {url}"))?;
        tracing::debug!(url = %url, "Seeded");
    }

    let counts = frontier.counts().await?;
    println!("Seeded {} URL(s); frontier holds {} ({} pending)", urls.len(), counts.total, counts.pending());
    Ok(())
}

/// Store the crawl target
pub async fn configure(config: Config, root_url: String, desired_count: u64) -> Result<()> {
    url::Url::parse(&root_url).with_context(|| format!("Invalid root URL: {root_url}"))?;

    let provider = open_database(&config)?.config_provider();
    provider.set_configuration(&CrawlConfiguration::new(root_url.clone(), desired_count))?;

    println!("Configured root URL {root_url} with {desired_count} desired article(s)");
    Ok(())
}

#[derive(Debug, Serialize)]
struct StoreStats {
    frontier_total: u64,
    frontier_visited: u64,
    frontier_pending: u64,
    articles: u64,
}

/// Print frontier and article counts
pub async fn stats(config: Config, json: bool) -> Result<()> {
    let db = open_database(&config)?;
    let counts = db.frontier().counts().await?;
    let articles = db.articles().count().await?;

    let stats = StoreStats {
        frontier_total: counts.total,
        frontier_visited: counts.visited,
        frontier_pending: counts.pending(),
        articles,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Database Stats");
    println!("--------------");
    println!("Frontier URLs: {}", stats.frontier_total);
    println!("Visited: {}", stats.frontier_visited);
    println!("Pending: {}", stats.frontier_pending);
    println!("Articles: {}", stats.articles);
    Ok(())
}
