//! Raw and normalized tabular representations of one input source.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A header row plus string cells, exactly as read from an input file.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Records the reader could not decode and left out of `rows`.
    pub skipped_rows: usize,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        Self {
            headers,
            rows,
            skipped_rows: 0,
        }
    }

    pub fn with_skipped_rows(mut self, skipped: usize) -> Self {
        self.skipped_rows = skipped;
        self
    }

    /// Index of the column whose header matches `name` exactly.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the column whose header matches `name` ignoring ASCII case.
    pub fn column_ignore_case(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Cell at `(row, col)`, empty string when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A normalized source: named numeric columns keyed by calendar day.
///
/// Holds at most one row per date; every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTable {
    pub columns: Vec<String>,
    pub rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl DailyTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// An empty table that still advertises its columns, so joins produce
    /// the expected (all-missing) covariates.
    pub fn empty(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn insert(&mut self, date: NaiveDate, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.insert(date, values);
    }

    pub fn get(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.rows.get(&date).map(|v| v.as_slice())
    }

    /// Value of a single column on a date.
    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&date).and_then(|v| v[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }
}
