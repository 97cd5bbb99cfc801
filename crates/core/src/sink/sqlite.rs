use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tracing::debug;

use super::{SinkError, TableSink};
use crate::table::Table;

/// Writes the table into a `report` table of a SQLite database.
///
/// The `report` table is recreated on every write.
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn write_into(conn: &mut Connection, table: &Table) -> Result<(), SinkError> {
        let tx = conn
            .transaction()
            .map_err(|e| SinkError::Database(e.to_string()))?;

        tx.execute_batch(
            r#"
            DROP TABLE IF EXISTS report;
            CREATE TABLE report (
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                merged_at TEXT NOT NULL,
                review_approved INTEGER NOT NULL,
                checks_status TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| SinkError::Database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO report (number, title, author, merged_at, review_approved, checks_status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| SinkError::Database(e.to_string()))?;

            for row in table.rows() {
                let number = i64::try_from(row.number).map_err(|_| {
                    SinkError::Database(format!("row number {} exceeds INTEGER range", row.number))
                })?;
                stmt.execute(params![
                    number,
                    row.title,
                    row.author,
                    row.merged_at,
                    row.review_approved,
                    row.checks_status.as_str(),
                ])
                .map_err(|e| SinkError::Database(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| SinkError::Database(e.to_string()))?;
        Ok(())
    }
}

impl TableSink for SqliteSink {
    fn write(&self, table: &Table) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut conn =
            Connection::open(&self.path).map_err(|e| SinkError::Database(e.to_string()))?;
        Self::write_into(&mut conn, table)?;
        debug!(path = %self.path.display(), rows = table.len(), "Wrote SQLite table");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
