//! Results log writer.
//!
//! Every correlated record becomes one `;`-delimited row. The file is opened
//! in append mode for each row and closed straight after, so the log can be
//! rotated or copied between cycles.

use crate::constants::results::DELIMITER;
use crate::error::{MergerError, Result};
use crate::models::CorrelatedRecord;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only results log
#[derive(Debug, Clone)]
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the log if needed
    pub fn append(&self, record: &CorrelatedRecord) -> Result<()> {
        self.write_row(&record.fields())
            .map_err(|source| MergerError::SinkWrite {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            "Appended part {} to {}",
            record.part_id,
            self.path.display()
        );
        Ok(())
    }

    fn write_row(&self, fields: &[String]) -> std::result::Result<(), csv::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        writer.write_record(fields)?;
        writer.flush()?;
        Ok(())
    }
}
