mod cli;

use anyhow::{Context, Result};
use clap::Parser as _;
use release_impact::chart::JsonChartWriter;
use release_impact::config::{load_config, AppConfig};
use release_impact::parser::MonthTableParser;
use release_impact::pipeline::{fetch_all, run_all};
use release_impact::scraper::HttpFetcher;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Fetch => fetch(&config).await,
        Commands::Analyze => analyze(&config),
        Commands::Run => {
            fetch(&config).await?;
            analyze(&config)
        }
    }
}

async fn fetch(config: &AppConfig) -> Result<()> {
    if config.sources.is_empty() {
        warn!("No sources configured, nothing to fetch");
        return Ok(());
    }
    let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_seconds))
        .context("building HTTP client")?;
    let parser = MonthTableParser::new();

    let summary = fetch_all(config, &fetcher, &parser).await;
    info!(
        "Fetch finished: {} requested, {} saved, {} failed",
        summary.requested,
        summary.saved.len(),
        summary.failed
    );
    Ok(())
}

fn analyze(config: &AppConfig) -> Result<()> {
    let charts = JsonChartWriter::new(&config.chart_dir);
    let summary = run_all(config, &charts).context("analysis run failed")?;
    info!(
        "Analysis finished: {} franchises ({} failed), {} files ({} skipped), {} charts, {} reports, {} analyses skipped",
        summary.franchises,
        summary.franchises_failed,
        summary.files_seen,
        summary.files_skipped,
        summary.charts_written,
        summary.reports_written,
        summary.analyses_skipped
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
