//! Persistence of the final table.

mod json;
mod sqlite;

pub use json::{write_snapshot, JsonSink};
pub use sqlite::SqliteSink;

use thiserror::Error;

use crate::config::{OutputConfig, OutputFormat};
use crate::table::Table;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

/// Destination for a finished table.
pub trait TableSink: Send + Sync {
    /// Persist every row of `table`, replacing any previous output.
    fn write(&self, table: &Table) -> Result<(), SinkError>;

    /// Human-readable destination, for logs.
    fn describe(&self) -> String;
}

/// Factory function to create a sink from config
pub fn create_sink(config: &OutputConfig) -> Box<dyn TableSink> {
    match config.format {
        OutputFormat::Json => Box::new(JsonSink::new(&config.path)),
        OutputFormat::Sqlite => Box::new(SqliteSink::new(&config.path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_create_sink_json() {
        let config = OutputConfig {
            format: OutputFormat::Json,
            path: PathBuf::from("out/report.json"),
            ..OutputConfig::default()
        };
        let sink = create_sink(&config);
        assert_eq!(sink.describe(), "json:out/report.json");
    }

    #[test]
    fn test_create_sink_sqlite() {
        let config = OutputConfig {
            format: OutputFormat::Sqlite,
            path: PathBuf::from("out/report.db"),
            ..OutputConfig::default()
        };
        let sink = create_sink(&config);
        assert_eq!(sink.describe(), "sqlite:out/report.db");
    }
}
