use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::{SinkError, TableSink};
use crate::table::Table;
use crate::types::RawItem;

/// Writes the table as a pretty-printed JSON array.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl TableSink for JsonSink {
    fn write(&self, table: &Table) -> Result<(), SinkError> {
        write_json(&self.path, table.rows())?;
        debug!(path = %self.path.display(), rows = table.len(), "Wrote JSON table");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Dump the fetched items, sorted by id, before enrichment.
pub fn write_snapshot(path: &Path, items: &[RawItem]) -> Result<(), SinkError> {
    let mut sorted: Vec<&RawItem> = items.iter().collect();
    sorted.sort_by_key(|i| i.id);
    write_json(path, &sorted)?;
    debug!(path = %path.display(), items = sorted.len(), "Wrote raw snapshot");
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
