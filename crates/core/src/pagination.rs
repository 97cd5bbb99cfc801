//! Page count discovery through the `Link` response header.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ApiTransport, ClientError};
use crate::endpoint::CollectionEndpoint;

/// `<target>; rel="relation"` entries of a `Link` header.
static LINK_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]*)>\s*;\s*rel="([^"]*)""#).unwrap());

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("{rel} link has no usable page parameter: {target}")]
    BadPageParameter { rel: String, target: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Find the target of relation `rel` in a `Link` header value.
pub fn link_target<'a>(header: &'a str, rel: &str) -> Option<&'a str> {
    LINK_ENTRY.captures_iter(header).find_map(|caps| {
        let relations = caps.get(2)?.as_str();
        relations
            .split_whitespace()
            .any(|r| r == rel)
            .then(|| caps.get(1).map(|m| m.as_str()))
            .flatten()
    })
}

/// Read the `page` query parameter of a link target.
pub fn page_of(target: &str) -> Option<u32> {
    let url = Url::parse(target).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

/// Page number of the `last` relation, if the header has one.
pub fn last_page(header: &str) -> Result<Option<u32>, PaginationError> {
    match link_target(header, "last") {
        None => Ok(None),
        Some(target) => page_of(target)
            .map(Some)
            .ok_or_else(|| PaginationError::BadPageParameter {
                rel: "last".to_string(),
                target: target.to_string(),
            }),
    }
}

/// Determines how many pages a collection endpoint has.
pub struct PageCountDiscoverer {
    transport: Arc<dyn ApiTransport>,
}

impl PageCountDiscoverer {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Self { transport }
    }

    /// Request page 1 and derive the page count.
    ///
    /// Without a `last` relation the count is 1 for a non-empty first page
    /// and 0 for an empty one. A non-2xx final response is an error.
    pub async fn discover(&self, endpoint: &CollectionEndpoint) -> Result<u32, PaginationError> {
        let url = endpoint.items_url();
        let response = self
            .transport
            .get(&url, &endpoint.page_params(1))
            .await?
            .error_for_status()?;

        if let Some(last) = response.link.as_deref().map(last_page).transpose()?.flatten() {
            info!(container = endpoint.container(), pages = last, "Discovered page count");
            return Ok(last);
        }

        let first: Vec<serde_json::Value> = response.json()?;
        let pages = u32::from(!first.is_empty());
        debug!(
            container = endpoint.container(),
            pages = pages,
            "No last link, page count from first page"
        );
        Ok(pages)
    }
}
