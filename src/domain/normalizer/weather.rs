//! Regional weather observations.
//!
//! Every non-date column is kept as a covariate. Temperature columns are
//! gap-filled with their median, rainfall columns with zero, anything else is
//! left with gaps.

use super::{NormalizedSource, SourceKind, SourceNormalizer, require_column};
use crate::domain::cleaning::{clean_number, parse_date};
use crate::domain::error::PricecastError;
use crate::domain::table::{DailyTable, RawTable};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillPolicy {
    Median,
    Zero,
    Keep,
}

impl FillPolicy {
    fn for_column(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("temp") {
            FillPolicy::Median
        } else if lower.contains("rain") || lower.contains("precipitation") {
            FillPolicy::Zero
        } else {
            FillPolicy::Keep
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherNormalizer {
    pub date_column: String,
}

impl Default for WeatherNormalizer {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
        }
    }
}

impl SourceNormalizer for WeatherNormalizer {
    fn source(&self) -> SourceKind {
        SourceKind::Weather
    }

    fn normalize(&self, raw: &RawTable) -> Result<NormalizedSource, PricecastError> {
        let date_col = require_column(raw, &self.date_column, SourceKind::Weather)?;
        let value_cols: Vec<usize> = (0..raw.headers.len()).filter(|&i| i != date_col).collect();
        let columns: Vec<String> = value_cols.iter().map(|&i| raw.headers[i].clone()).collect();

        let mut table = DailyTable::new(columns);
        let mut dropped = 0usize;
        for row in 0..raw.row_count() {
            let Some(date) = parse_date(raw.cell(row, date_col)) else {
                dropped += 1;
                continue;
            };
            let values = value_cols
                .iter()
                .map(|&col| clean_number(raw.cell(row, col)))
                .collect();
            table.insert(date, values);
        }

        let mut filled = 0usize;
        for (idx, name) in table.columns.iter().enumerate() {
            let replacement = match FillPolicy::for_column(name) {
                FillPolicy::Median => {
                    let observed: Vec<f64> = table.rows.values().filter_map(|v| v[idx]).collect();
                    median(observed)
                }
                FillPolicy::Zero => Some(0.0),
                FillPolicy::Keep => None,
            };
            if let Some(fill) = replacement {
                for values in table.rows.values_mut() {
                    if values[idx].is_none() {
                        values[idx] = Some(fill);
                        filled += 1;
                    }
                }
            }
        }

        debug!(
            days = table.len(),
            columns = table.columns.len(),
            dropped,
            filled,
            "normalized weather table"
        );
        Ok(NormalizedSource {
            table,
            dropped_rows: dropped,
        })
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
