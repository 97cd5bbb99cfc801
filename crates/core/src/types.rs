//! Domain records and the upstream wire shapes they are parsed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author recorded when the upstream account no longer exists.
pub const GHOST_AUTHOR: &str = "ghost";

/// One pull request from the collection listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Pull request number, unique within the container.
    pub id: u64,
    pub title: String,
    pub author: String,
    /// Merge timestamp; `None` for closed-but-unmerged pull requests.
    pub completed_at: Option<DateTime<Utc>>,
    /// Head commit SHA.
    pub reference_sha: String,
    /// Base repository full name (`owner/name`).
    pub container: String,
}

impl RawItem {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A merged pull request with its review and check state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub completed_at: DateTime<Utc>,
    pub reference_sha: String,
    pub container: String,
    pub review_approved: bool,
    pub checks_status: ChecksStatus,
}

impl EnrichedRecord {
    /// Build a record from a completed item.
    ///
    /// Returns the item back if it has no completion timestamp.
    pub fn from_item(
        item: RawItem,
        review_approved: bool,
        checks_status: ChecksStatus,
    ) -> Result<Self, RawItem> {
        let Some(completed_at) = item.completed_at else {
            return Err(item);
        };
        Ok(Self {
            id: item.id,
            title: item.title,
            author: item.author,
            completed_at,
            reference_sha: item.reference_sha,
            container: item.container,
            review_approved,
            checks_status,
        })
    }
}

/// Aggregate verdict over a commit's automated checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecksStatus {
    #[default]
    NoChecks,
    Passed,
    Failed,
}

impl ChecksStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksStatus::NoChecks => "NO_CHECKS",
            ChecksStatus::Passed => "PASSED",
            ChecksStatus::Failed => "FAILED",
        }
    }

    /// Derive the verdict from a commit's check-runs.
    ///
    /// Empty is `NoChecks`; every run completed with `success` is `Passed`;
    /// anything else, including runs still in progress, is `Failed`.
    pub fn from_check_runs(runs: &[CheckRun]) -> Self {
        if runs.is_empty() {
            ChecksStatus::NoChecks
        } else if runs.iter().all(CheckRun::is_successful) {
            ChecksStatus::Passed
        } else {
            ChecksStatus::Failed
        }
    }

    /// Derive the verdict from the legacy combined commit status.
    pub fn from_combined_status(status: &CombinedStatus) -> Self {
        if status.statuses.is_empty() {
            ChecksStatus::NoChecks
        } else if status.state == "success" {
            ChecksStatus::Passed
        } else {
            ChecksStatus::Failed
        }
    }
}

impl std::fmt::Display for ChecksStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub state: String,
}

impl Review {
    pub fn is_approval(&self) -> bool {
        self.state == "APPROVED"
    }
}

/// True iff at least one review approves.
pub fn any_approved(reviews: &[Review]) -> bool {
    reviews.iter().any(Review::is_approval)
}

/// A single check-run attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
}

impl CheckRun {
    pub fn is_successful(&self) -> bool {
        self.status == "completed" && self.conclusion.as_deref() == Some("success")
    }
}

/// Body of `commits/{sha}/check-runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunList {
    pub check_runs: Vec<CheckRun>,
}

/// Body of the legacy `commits/{sha}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinedStatus {
    pub state: String,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

/// A listing element that could not be turned into a [`RawItem`].
#[derive(Debug, Error)]
pub enum ItemParseError {
    #[error("pull request #{number} has no {field}")]
    MissingField { number: u64, field: &'static str },

    #[error("malformed pull request: {0}")]
    Malformed(#[from] serde_json::Error),
}

// Wire shapes of a pull request listing element.

#[derive(Debug, Deserialize)]
pub(crate) struct WirePull {
    pub number: u64,
    pub title: String,
    pub user: Option<WireUser>,
    pub merged_at: Option<DateTime<Utc>>,
    pub head: WireRef,
    pub base: WireBase,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireBase {
    pub repo: Option<WireRepo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRepo {
    pub full_name: String,
}

impl TryFrom<WirePull> for RawItem {
    type Error = ItemParseError;

    fn try_from(pull: WirePull) -> Result<Self, Self::Error> {
        let container = pull
            .base
            .repo
            .map(|r| r.full_name)
            .ok_or(ItemParseError::MissingField {
                number: pull.number,
                field: "base.repo",
            })?;

        Ok(RawItem {
            id: pull.number,
            title: pull.title,
            author: pull
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| GHOST_AUTHOR.to_string()),
            completed_at: pull.merged_at,
            reference_sha: pull.head.sha,
            container,
        })
    }
}

/// One listing page, split by completion state.
#[derive(Debug, Default)]
pub struct ParsedPage {
    /// Merged items.
    pub completed: Vec<RawItem>,
    /// Elements without a merge timestamp, dropped unparsed.
    pub discarded: usize,
    /// Merged elements that could not be parsed.
    pub rejected: Vec<ItemParseError>,
}

/// Parse one page of a pull request listing.
///
/// Elements are parsed one at a time so a bad element only costs itself.
/// Only a body that is not a JSON array fails the whole page.
pub fn parse_page(body: &str) -> Result<ParsedPage, ItemParseError> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut page = ParsedPage::default();

    for element in elements {
        let unmerged = element.is_object()
            && element
                .get("merged_at")
                .map_or(true, serde_json::Value::is_null);
        if unmerged {
            page.discarded += 1;
            continue;
        }

        match serde_json::from_value::<WirePull>(element)
            .map_err(ItemParseError::from)
            .and_then(RawItem::try_from)
        {
            Ok(item) => page.completed.push(item),
            Err(e) => page.rejected.push(e),
        }
    }

    Ok(page)
}
