//! URL construction for the upstream REST routes.

use crate::config::{ChecksSource, Config};

/// Page size used for sub-resource lists.
pub const SUB_RESOURCE_PAGE_SIZE: u32 = 100;

/// A paginated pull request listing of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEndpoint {
    base_url: String,
    container: String,
    state: String,
    per_page: u32,
}

impl CollectionEndpoint {
    pub fn new(base_url: &str, container: &str, state: &str, per_page: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            container: container.to_string(),
            state: state.to_string(),
            per_page,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.api.base_url,
            &config.source.container,
            &config.source.state,
            config.source.per_page,
        )
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// `GET /repos/{container}/pulls`
    pub fn items_url(&self) -> String {
        format!("{}/repos/{}/pulls", self.base_url, self.container)
    }

    /// Query parameters for one page of the listing.
    pub fn page_params(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("state", self.state.clone()),
            ("per_page", self.per_page.to_string()),
            ("page", page.to_string()),
        ]
    }
}

/// Routes for the per-item lookups, scoped by the item's own container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRoutes {
    base_url: String,
}

impl LookupRoutes {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /repos/{container}/pulls/{id}/reviews`
    pub fn reviews_url(&self, container: &str, id: u64) -> String {
        format!("{}/repos/{}/pulls/{}/reviews", self.base_url, container, id)
    }

    /// Check-state route for `sha` according to the configured source.
    pub fn checks_url(&self, source: ChecksSource, container: &str, sha: &str) -> String {
        let leaf = match source {
            ChecksSource::CheckRuns => "check-runs",
            ChecksSource::CombinedStatus => "status",
        };
        format!(
            "{}/repos/{}/commits/{}/{}",
            self.base_url, container, sha, leaf
        )
    }

    pub fn list_params() -> Vec<(&'static str, String)> {
        vec![("per_page", SUB_RESOURCE_PAGE_SIZE.to_string())]
    }
}
