use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recipe_box_sync::config::AppConfig;
use recipe_box_sync::fetch::{Fetcher, FetcherConfig};
use recipe_box_sync::scrape::scrape_page;
use recipe_box_sync::storage::WebDavStore;
use recipe_box_sync::sync::{Orchestrator, UploadTarget};

#[derive(Parser)]
#[command(name = "recipe-box-sync")]
#[command(about = "Upload this week's recipe cards to a WebDAV folder")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Returns whether the run succeeded; `Err` is reserved for fatal setup
/// failures.
async fn run(cli: &Cli) -> Result<bool> {
    tracing::info!("Starting recipe-box-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("Invalid configuration {}", cli.config.display()))?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let page_url = config.scraper.page_url()?;
    let fetcher = Arc::new(
        Fetcher::new(FetcherConfig::from(&config.scraper))
            .context("Failed to create HTTP client")?,
    );

    let store = WebDavStore::connect(&config.webdav)
        .await
        .context("Cannot connect to WebDAV server")?;

    let links = scrape_page(&fetcher, &page_url)
        .await
        .with_context(|| format!("Cannot scrape {}", page_url))?;
    if links.is_empty() {
        tracing::warn!("No recipe found on {}", page_url);
        return Ok(false);
    }

    let orchestrator = Orchestrator::new(
        UploadTarget::from(&config.webdav),
        fetcher,
        Arc::new(store),
    );
    let report = orchestrator.run(&links).await;

    Ok(report.is_success())
}
