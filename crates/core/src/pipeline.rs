//! End-to-end harvest: discover, fetch, enrich, aggregate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::client::ApiTransport;
use crate::config::Config;
use crate::endpoint::CollectionEndpoint;
use crate::enricher::{enrich_all, ItemEnricher};
use crate::fetcher::ParallelPageFetcher;
use crate::metrics;
use crate::pagination::{PageCountDiscoverer, PaginationError};
use crate::runner::{BoundedBatchRunner, TaskFailure};
use crate::sink::{write_snapshot, SinkError};
use crate::table::{aggregate, Table};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("page count discovery failed: {0}")]
    Discovery(#[from] PaginationError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Result of one harvest run.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub table: Table,
    pub page_count: u32,
    /// Pages skipped after exhausting retries, ascending.
    pub failed_pages: Vec<u32>,
    /// Completed items returned by the page stage.
    pub items_fetched: usize,
    pub items_enriched: usize,
    /// Items dropped because a lookup failed.
    pub failed_items: Vec<TaskFailure>,
}

impl HarvestReport {
    /// True when no page or item was dropped.
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty() && self.failed_items.is_empty()
    }
}

/// Runs the four harvest stages against one container.
pub struct HarvestPipeline {
    transport: Arc<dyn ApiTransport>,
    endpoint: CollectionEndpoint,
    enricher: Arc<ItemEnricher>,
    page_workers: usize,
    enrich_workers: usize,
    raw_snapshot_path: Option<PathBuf>,
}

impl HarvestPipeline {
    pub fn new(config: &Config, transport: Arc<dyn ApiTransport>) -> Self {
        let enricher = ItemEnricher::new(
            Arc::clone(&transport),
            &config.api.base_url,
            config.source.checks_source,
        );
        Self {
            endpoint: CollectionEndpoint::from_config(config),
            enricher: Arc::new(enricher),
            page_workers: config.concurrency.page_workers,
            enrich_workers: config.concurrency.enrich_workers,
            raw_snapshot_path: config.output.raw_snapshot_path.clone(),
            transport,
        }
    }

    /// Run every stage once.
    ///
    /// Only discovery failure aborts the run. Failed pages and items are
    /// reported and left out of the table.
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        let started = Instant::now();
        info!(container = self.endpoint.container(), "Starting harvest");

        let stage = Instant::now();
        let page_count = PageCountDiscoverer::new(Arc::clone(&self.transport))
            .discover(&self.endpoint)
            .await?;
        observe_stage("discover", stage);

        if page_count == 0 {
            info!(container = self.endpoint.container(), "Collection is empty");
            return Ok(HarvestReport::default());
        }

        let stage = Instant::now();
        let fetched = ParallelPageFetcher::new(Arc::clone(&self.transport), self.page_workers)
            .fetch_all(&self.endpoint, page_count)
            .await;
        observe_stage("fetch", stage);

        if let Some(path) = &self.raw_snapshot_path {
            write_snapshot(path, &fetched.items)?;
        }

        let items_fetched = fetched.items.len();
        let stage = Instant::now();
        let runner = BoundedBatchRunner::new("items", self.enrich_workers);
        let enriched = enrich_all(Arc::clone(&self.enricher), &runner, fetched.items).await;
        observe_stage("enrich", stage);

        let stage = Instant::now();
        let items_enriched = enriched.succeeded.len();
        let table = aggregate(enriched.succeeded);
        observe_stage("aggregate", stage);

        let report = HarvestReport {
            table,
            page_count,
            failed_pages: fetched.failed_pages,
            items_fetched,
            items_enriched,
            failed_items: enriched.failures,
        };

        if report.is_complete() {
            info!(
                pages = page_count,
                rows = report.table.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Harvest complete"
            );
        } else {
            warn!(
                pages = page_count,
                rows = report.table.len(),
                failed_pages = report.failed_pages.len(),
                failed_items = report.failed_items.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Harvest complete with omissions"
            );
        }

        Ok(report)
    }
}

fn observe_stage(stage: &str, started: Instant) {
    metrics::STAGE_DURATION
        .with_label_values(&[stage])
        .observe(started.elapsed().as_secs_f64());
}
