//! Sparse single-value series (fuel, inflation, exchange rate) resampled to a
//! daily grid by carrying the last observation forward.

use super::{NormalizedSource, SourceKind, SourceNormalizer};
use crate::domain::cleaning::{clean_number, parse_date};
use crate::domain::error::PricecastError;
use crate::domain::table::{DailyTable, RawTable};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Reads the first column as the date and the second as the value; the
/// upstream files have free-form headers.
#[derive(Debug, Clone)]
pub struct ForwardFillNormalizer {
    pub kind: SourceKind,
    pub output_column: String,
    /// Extend the fill at least through this date.
    pub fill_until: Option<NaiveDate>,
}

impl ForwardFillNormalizer {
    pub fn new(kind: SourceKind, output_column: &str) -> Self {
        Self {
            kind,
            output_column: output_column.to_string(),
            fill_until: None,
        }
    }

    pub fn fill_until(mut self, date: Option<NaiveDate>) -> Self {
        self.fill_until = date;
        self
    }
}

impl SourceNormalizer for ForwardFillNormalizer {
    fn source(&self) -> SourceKind {
        self.kind
    }

    fn normalize(&self, raw: &RawTable) -> Result<NormalizedSource, PricecastError> {
        if raw.headers.len() < 2 {
            return Err(PricecastError::SchemaMismatch {
                source_name: self.kind.name().to_string(),
                column: "<value column>".to_string(),
            });
        }

        let mut observations: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut dropped = 0usize;
        for row in 0..raw.row_count() {
            match parse_date(raw.cell(row, 0)).zip(clean_number(raw.cell(row, 1))) {
                Some((date, value)) => {
                    observations.insert(date, value);
                }
                None => dropped += 1,
            }
        }

        let mut table = DailyTable::new(vec![self.output_column.clone()]);
        if let (Some((&first, _)), Some((&last, _))) =
            (observations.first_key_value(), observations.last_key_value())
        {
            let end = self.fill_until.map_or(last, |until| until.max(last));
            let mut carried = None;
            for day in first.iter_days().take_while(|d| *d <= end) {
                if let Some(&value) = observations.get(&day) {
                    carried = Some(value);
                }
                table.insert(day, vec![carried]);
            }
        }

        debug!(
            source = %self.kind,
            observations = observations.len(),
            days = table.len(),
            dropped,
            "resampled forward-filled series"
        );
        Ok(NormalizedSource {
            table,
            dropped_rows: dropped,
        })
    }
}
