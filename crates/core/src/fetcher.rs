//! Concurrent fetching of every listing page.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ApiTransport, ClientError};
use crate::endpoint::CollectionEndpoint;
use crate::metrics;
use crate::runner::BoundedBatchRunner;
use crate::types::{parse_page, ItemParseError, RawItem};

/// Why a page contributed nothing.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Parse(#[from] ItemParseError),
}

/// Items gathered from all pages.
#[derive(Debug, Default)]
pub struct PageFetchOutcome {
    /// Completed items from every page that succeeded, in no particular order.
    pub items: Vec<RawItem>,
    /// Pages that failed after the client's retries.
    pub failed_pages: Vec<u32>,
}

/// Fetches pages `1..=page_count` on a bounded worker pool.
pub struct ParallelPageFetcher {
    transport: Arc<dyn ApiTransport>,
    runner: BoundedBatchRunner,
}

impl ParallelPageFetcher {
    pub fn new(transport: Arc<dyn ApiTransport>, concurrency: usize) -> Self {
        Self {
            transport,
            runner: BoundedBatchRunner::new("pages", concurrency),
        }
    }

    /// Fetch every page and keep only completed items.
    ///
    /// A failing page is logged and skipped; it never aborts its siblings.
    pub async fn fetch_all(&self, endpoint: &CollectionEndpoint, page_count: u32) -> PageFetchOutcome {
        if page_count == 0 {
            return PageFetchOutcome::default();
        }

        let transport = Arc::clone(&self.transport);
        let endpoint = Arc::new(endpoint.clone());

        let report = self
            .runner
            .run_all(
                (1..=page_count).collect(),
                |page| *page,
                move |page| {
                    let transport = Arc::clone(&transport);
                    let endpoint = Arc::clone(&endpoint);
                    async move {
                        let result = fetch_page(transport.as_ref(), &endpoint, page).await;
                        let label = if result.is_ok() { "success" } else { "failed" };
                        metrics::PAGES_FETCHED.with_label_values(&[label]).inc();
                        result
                    }
                },
            )
            .await;

        let mut failed_pages: Vec<u32> = report
            .failures
            .iter()
            .filter_map(|f| f.key.parse().ok())
            .collect();
        failed_pages.sort_unstable();

        let items: Vec<RawItem> = report.succeeded.into_iter().flatten().collect();

        if failed_pages.is_empty() {
            info!(pages = page_count, items = items.len(), "Fetched all pages");
        } else {
            warn!(
                pages = page_count,
                failed = ?failed_pages,
                items = items.len(),
                "Fetched pages with failures"
            );
        }

        PageFetchOutcome {
            items,
            failed_pages,
        }
    }
}

/// Fetch one page and filter it to completed items.
pub async fn fetch_page(
    transport: &dyn ApiTransport,
    endpoint: &CollectionEndpoint,
    page: u32,
) -> Result<Vec<RawItem>, PageError> {
    let response = transport
        .get(&endpoint.items_url(), &endpoint.page_params(page))
        .await?
        .error_for_status()?;

    let parsed = parse_page(&response.body)?;
    for error in &parsed.rejected {
        warn!(page = page, error = %error, "Skipping malformed item");
    }

    metrics::ITEMS_KEPT.inc_by(parsed.completed.len() as u64);
    metrics::ITEMS_DISCARDED.inc_by(parsed.discarded as u64);
    metrics::ITEMS_MALFORMED.inc_by(parsed.rejected.len() as u64);
    debug!(
        page = page,
        kept = parsed.completed.len(),
        discarded = parsed.discarded,
        malformed = parsed.rejected.len(),
        "Fetched page"
    );

    Ok(parsed.completed)
}
