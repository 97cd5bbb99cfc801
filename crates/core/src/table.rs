//! Flat tabular view of the enriched records.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ChecksStatus, EnrichedRecord};

/// Column names, in output order.
pub const COLUMNS: [&str; 6] = [
    "number",
    "title",
    "author",
    "merged_at",
    "review_approved",
    "checks_status",
];

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub number: u64,
    pub title: String,
    pub author: String,
    /// RFC 3339, UTC, second precision.
    pub merged_at: String,
    pub review_approved: bool,
    pub checks_status: ChecksStatus,
}

impl From<EnrichedRecord> for TableRow {
    fn from(record: EnrichedRecord) -> Self {
        Self {
            number: record.id,
            title: record.title,
            author: record.author,
            merged_at: record
                .completed_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            review_approved: record.review_approved,
            checks_status: record.checks_status,
        }
    }
}

/// The final row set, ordered by `number`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<TableRow>,
}

impl Table {
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    /// Canonical JSON encoding of the rows.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.rows)
    }

    /// SHA-256 of the canonical encoding, hex encoded.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let digest = Sha256::digest(self.to_json()?.as_bytes());
        Ok(format!("{:x}", digest))
    }
}

/// Build the table from enriched records.
///
/// Completion order of the upstream stages does not affect the result.
pub fn aggregate(records: Vec<EnrichedRecord>) -> Table {
    let mut rows: Vec<TableRow> = records.into_iter().map(TableRow::from).collect();
    rows.sort_by_key(|r| r.number);
    Table { rows }
}
