//! CSV file source adapter.

use crate::domain::error::PricecastError;
use crate::domain::normalizer::SourceKind;
use crate::domain::pipeline::DataConfig;
use crate::domain::table::RawTable;
use crate::ports::source_port::SourcePort;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct CsvSourceAdapter {
    data: DataConfig,
}

impl CsvSourceAdapter {
    pub fn new(data: DataConfig) -> Self {
        Self { data }
    }

    fn csv_path(&self, kind: SourceKind) -> PathBuf {
        self.data.path(kind)
    }
}

impl SourcePort for CsvSourceAdapter {
    fn read_table(&self, kind: SourceKind) -> Result<Option<RawTable>, PricecastError> {
        let path = self.csv_path(kind);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(&path)?;

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_slice());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| PricecastError::SourceMalformed {
                source_name: kind.name().to_string(),
                reason: format!("failed to read header of {}: {}", path.display(), e),
            })?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for result in rdr.records() {
            match result {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
                Err(e) => {
                    skipped += 1;
                    debug!(source = %kind, error = %e, "skipping unreadable CSV record");
                }
            }
        }
        if skipped > 0 {
            warn!(source = %kind, skipped, path = %path.display(), "skipped unreadable CSV records");
        }

        Ok(Some(RawTable::new(headers, rows).with_skipped_rows(skipped)))
    }

    fn describe(&self, kind: SourceKind) -> String {
        self.csv_path(kind).display().to_string()
    }
}
