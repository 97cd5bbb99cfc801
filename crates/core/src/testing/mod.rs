//! Testing utilities and mock implementations.
//!
//! This module provides a scripted [`MockTransport`] that stands in for the
//! HTTP client, allowing every pipeline stage to be exercised without a
//! network.
//!
//! # Example
//!
//! ```rust,ignore
//! use prharvest_core::testing::{fixtures, MockReply, MockTransport};
//!
//! let transport = MockTransport::new();
//! transport
//!     .reply(
//!         &fixtures::pulls_route("octo/widgets", 1),
//!         MockReply::json(200, json!([fixtures::pull_json(1, true)])),
//!     )
//!     .await;
//! ```

mod mock_transport;

pub use mock_transport::{MockReply, MockTransport, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use super::MockTransport;
    use crate::types::RawItem;

    /// Container used by the fixtures.
    pub const CONTAINER: &str = "octo/widgets";

    /// Head SHA assigned to pull request `number`.
    pub fn sha_for(number: u64) -> String {
        format!("{:040x}", number)
    }

    /// A listing element in the upstream wire shape.
    pub fn pull_json(number: u64, merged: bool) -> Value {
        let merged_at = if merged {
            Value::String(format!("2024-01-{:02}T10:00:00Z", (number % 28) + 1))
        } else {
            Value::Null
        };
        json!({
            "number": number,
            "title": format!("Change #{}", number),
            "user": {"login": format!("dev{}", number % 5)},
            "merged_at": merged_at,
            "head": {"sha": sha_for(number)},
            "base": {"repo": {"full_name": CONTAINER}},
        })
    }

    /// A merged item as the fetcher would produce it.
    pub fn raw_item(number: u64) -> RawItem {
        RawItem {
            id: number,
            title: format!("Change #{}", number),
            author: format!("dev{}", number % 5),
            completed_at: Some(
                Utc.with_ymd_and_hms(2024, 1, ((number % 28) + 1) as u32, 10, 0, 0)
                    .unwrap(),
            ),
            reference_sha: sha_for(number),
            container: CONTAINER.to_string(),
        }
    }

    pub fn review_json(state: &str) -> Value {
        json!({"id": 1, "state": state, "user": {"login": "reviewer"}})
    }

    pub fn check_run_json(status: &str, conclusion: Option<&str>) -> Value {
        json!({"name": "ci", "status": status, "conclusion": conclusion})
    }

    pub fn check_runs_body(runs: Vec<Value>) -> Value {
        json!({"total_count": runs.len(), "check_runs": runs})
    }

    /// Route of one listing page on the mock transport.
    pub fn pulls_route(container: &str, page: u32) -> String {
        format!(
            "{}/repos/{}/pulls?page={}",
            MockTransport::BASE_URL,
            container,
            page
        )
    }

    /// URL of a listing page as it would appear in a `Link` header.
    pub fn pulls_link(container: &str, page: u32) -> String {
        format!(
            "{}/repos/{}/pulls?state=closed&per_page=100&page={}",
            MockTransport::BASE_URL,
            container,
            page
        )
    }

    /// `Link` header with `next` and `last` relations.
    pub fn link_header(container: &str, next: u32, last: u32) -> String {
        format!(
            "<{}>; rel=\"next\", <{}>; rel=\"last\"",
            pulls_link(container, next),
            pulls_link(container, last)
        )
    }

    pub fn reviews_route(container: &str, number: u64) -> String {
        format!(
            "{}/repos/{}/pulls/{}/reviews",
            MockTransport::BASE_URL,
            container,
            number
        )
    }

    pub fn check_runs_route(container: &str, sha: &str) -> String {
        format!(
            "{}/repos/{}/commits/{}/check-runs",
            MockTransport::BASE_URL,
            container,
            sha
        )
    }

    pub fn status_route(container: &str, sha: &str) -> String {
        format!(
            "{}/repos/{}/commits/{}/status",
            MockTransport::BASE_URL,
            container,
            sha
        )
    }
}
