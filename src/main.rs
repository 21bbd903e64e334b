use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unarxiv::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "unarxiv",
    version,
    about = "Concurrent crawler for arXiv-style article pages",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl until the goal is met or the frontier runs dry
    Crawl {
        /// Root URL to crawl (overrides the stored configuration)
        #[arg(long, requires = "desired_count")]
        root_url: Option<String>,

        /// Desired number of stored articles
        #[arg(long, requires = "root_url")]
        desired_count: Option<u64>,
    },

    /// Crawl repeatedly on the configured schedule
    Run,

    /// Add URLs to the frontier
    Seed {
        /// URLs to enqueue
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Store the crawl target in the database
    Configure {
        /// Root URL; also the in-domain filter for discovered links
        #[arg(long)]
        root_url: String,

        /// Desired number of stored articles
        #[arg(long)]
        desired_count: u64,
    },

    /// Show frontier and article counts
    Stats {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Crawl {
            root_url,
            desired_count,
        } => {
            tracing::info!(
                root_url = ?root_url,
                desired_count = ?desired_count,
                "Starting crawl command"
            );
            commands::crawl(config, root_url, desired_count).await?;
        }

        Commands::Run => {
            tracing::info!("Starting run command");
            commands::run(config).await?;
        }

        Commands::Seed { urls } => {
            tracing::info!(count = urls.len(), "Starting seed command");
            commands::seed(config, urls).await?;
        }

        Commands::Configure {
            root_url,
            desired_count,
        } => {
            tracing::info!(
                root_url = %root_url,
                desired_count,
                "Starting configure command"
            );
            commands::configure(config, root_url, desired_count).await?;
        }

        Commands::Stats { json } => {
            commands::stats(config, json).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("unarxiv=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new(format!("unarxiv={level},warn"))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
