//! Per-item review and check lookups.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ApiResponse, ApiTransport, ClientError};
use crate::config::ChecksSource;
use crate::endpoint::LookupRoutes;
use crate::metrics;
use crate::pagination::link_target;
use crate::runner::{BatchReport, BoundedBatchRunner};
use crate::types::{
    any_approved, CheckRun, CheckRunList, ChecksStatus, CombinedStatus, EnrichedRecord, RawItem,
    Review,
};

/// Upper bound on `next` links followed for a single sub-resource list.
const MAX_LIST_PAGES: usize = 50;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("item #{id} has no completion timestamp")]
    NotCompleted { id: u64 },

    #[error("review lookup for #{id} failed: {source}")]
    Reviews {
        id: u64,
        #[source]
        source: ClientError,
    },

    #[error("check lookup for #{id} at {sha} failed: {source}")]
    Checks {
        id: u64,
        sha: String,
        #[source]
        source: ClientError,
    },
}

/// Derives `review_approved` and `checks_status` for one item.
pub struct ItemEnricher {
    transport: Arc<dyn ApiTransport>,
    routes: LookupRoutes,
    checks_source: ChecksSource,
}

impl ItemEnricher {
    pub fn new(transport: Arc<dyn ApiTransport>, base_url: &str, checks_source: ChecksSource) -> Self {
        Self {
            transport,
            routes: LookupRoutes::new(base_url),
            checks_source,
        }
    }

    /// Run both lookups concurrently and build the record.
    ///
    /// Either lookup failing fails the whole item; no partial record is built.
    pub async fn enrich(&self, item: RawItem) -> Result<EnrichedRecord, EnrichError> {
        if !item.is_completed() {
            return Err(EnrichError::NotCompleted { id: item.id });
        }

        let (review_approved, checks_status) =
            futures::try_join!(self.review_approved(&item), self.checks_status(&item))?;

        debug!(
            id = item.id,
            review_approved = review_approved,
            checks_status = %checks_status,
            "Enriched item"
        );

        EnrichedRecord::from_item(item, review_approved, checks_status)
            .map_err(|item| EnrichError::NotCompleted { id: item.id })
    }

    async fn review_approved(&self, item: &RawItem) -> Result<bool, EnrichError> {
        let url = self.routes.reviews_url(&item.container, item.id);
        let reviews: Vec<Review> = collect_list(self.transport.as_ref(), &url, |r| r.json())
            .await
            .map_err(|source| EnrichError::Reviews {
                id: item.id,
                source,
            })?;
        Ok(any_approved(&reviews))
    }

    async fn checks_status(&self, item: &RawItem) -> Result<ChecksStatus, EnrichError> {
        let url = self
            .routes
            .checks_url(self.checks_source, &item.container, &item.reference_sha);
        let to_error = |source| EnrichError::Checks {
            id: item.id,
            sha: item.reference_sha.clone(),
            source,
        };

        match self.checks_source {
            ChecksSource::CheckRuns => {
                let runs: Vec<CheckRun> = collect_list(self.transport.as_ref(), &url, |r| {
                    r.json::<CheckRunList>().map(|list| list.check_runs)
                })
                .await
                .map_err(to_error)?;
                Ok(ChecksStatus::from_check_runs(&runs))
            }
            ChecksSource::CombinedStatus => {
                let status: CombinedStatus = self
                    .transport
                    .get(&url, &LookupRoutes::list_params())
                    .await
                    .and_then(ApiResponse::error_for_status)
                    .and_then(|r| r.json())
                    .map_err(to_error)?;
                Ok(ChecksStatus::from_combined_status(&status))
            }
        }
    }
}

/// GET a list resource and follow `rel="next"` links until exhausted.
///
/// A list still advertising a `next` page after [`MAX_LIST_PAGES`] pages is
/// an error rather than a truncated result.
async fn collect_list<T>(
    transport: &dyn ApiTransport,
    url: &str,
    decode: impl Fn(&ApiResponse) -> Result<Vec<T>, ClientError>,
) -> Result<Vec<T>, ClientError> {
    let mut response = transport
        .get(url, &LookupRoutes::list_params())
        .await?
        .error_for_status()?;
    let mut all = decode(&response)?;
    let mut pages = 1;

    loop {
        let Some(next) = response
            .link
            .as_deref()
            .and_then(|h| link_target(h, "next"))
            .map(str::to_string)
        else {
            return Ok(all);
        };
        if pages >= MAX_LIST_PAGES {
            return Err(ClientError::PageLimit {
                url: url.to_string(),
                limit: MAX_LIST_PAGES,
            });
        }
        response = transport.get(&next, &[]).await?.error_for_status()?;
        all.extend(decode(&response)?);
        pages += 1;
    }
}

/// Enrich every item on `runner`, dropping items whose enrichment failed.
pub async fn enrich_all(
    enricher: Arc<ItemEnricher>,
    runner: &BoundedBatchRunner,
    items: Vec<RawItem>,
) -> BatchReport<EnrichedRecord> {
    let total = items.len();
    let report = runner
        .run_all(
            items,
            |item| item.id,
            move |item| {
                let enricher = Arc::clone(&enricher);
                async move {
                    let result = enricher.enrich(item).await;
                    match &result {
                        Ok(record) => {
                            metrics::ENRICHMENTS.with_label_values(&["success"]).inc();
                            metrics::CHECKS_STATUS
                                .with_label_values(&[record.checks_status.as_str()])
                                .inc();
                        }
                        Err(_) => metrics::ENRICHMENTS.with_label_values(&["failed"]).inc(),
                    }
                    result
                }
            },
        )
        .await;

    info!(
        items = total,
        enriched = report.succeeded.len(),
        failed = report.failures.len(),
        "Enrichment finished"
    );
    report
}
