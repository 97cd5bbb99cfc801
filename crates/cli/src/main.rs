use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prharvest_core::{
    create_sink, load_config, metrics, validate_config, ApiTransport, HarvestPipeline,
    HarvestReport, ResilientClient,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the config file
const CONFIG_ENV_VAR: &str = "PRHARVEST_CONFIG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(version = VERSION, "prharvest starting");

    // Determine config path
    let config_path = std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("prharvest.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    // Credential must be present before any request goes out
    let token = config.resolve_token().context("Missing API credential")?;

    info!(
        container = %config.source.container,
        base_url = %config.api.base_url,
        checks_source = ?config.source.checks_source,
        page_workers = config.concurrency.page_workers,
        enrich_workers = config.concurrency.enrich_workers,
        "Configuration loaded"
    );

    let client = ResilientClient::new(&config.api, config.retry.clone(), &token)
        .context("Failed to build HTTP client")?;
    let transport: Arc<dyn ApiTransport> = Arc::new(client);

    let report = HarvestPipeline::new(&config, transport)
        .run()
        .await
        .context("Harvest failed")?;

    let sink = create_sink(&config.output);
    sink.write(&report.table)
        .with_context(|| format!("Failed to write table to {}", sink.describe()))?;

    log_summary(&report, &sink.describe())?;

    if let Some(path) = &config.output.metrics_path {
        write_metrics(path)?;
        info!("Metrics written to {:?}", path);
    }

    Ok(())
}

fn log_summary(report: &HarvestReport, destination: &str) -> Result<()> {
    let fingerprint = report
        .table
        .fingerprint()
        .context("Failed to fingerprint table")?;

    info!(
        destination = destination,
        pages = report.page_count,
        fetched = report.items_fetched,
        rows = report.table.len(),
        fingerprint = %fingerprint,
        "Table written"
    );

    if !report.failed_pages.is_empty() {
        warn!(pages = ?report.failed_pages, "Some pages were skipped");
    }
    for failure in &report.failed_items {
        warn!(item = %failure.key, error = %failure.error, "Item omitted");
    }
    Ok(())
}

/// Dump every metric in text exposition format.
fn write_metrics(path: &Path) -> Result<()> {
    let text = metrics::render_text().context("Failed to render metrics")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write metrics to {:?}", path))?;
    Ok(())
}
