//! The merged daily frame every downstream stage reads from.

use crate::domain::error::PricecastError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// One day: the target (undefined only for a pending forecast row) plus one
/// cell per covariate column.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub date: NaiveDate,
    pub target: Option<f64>,
    pub values: Vec<Option<f64>>,
}

/// Rows strictly ascending by date with a date index for lag lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFrame {
    pub target_name: String,
    pub columns: Vec<String>,
    rows: Vec<FrameRow>,
    index: HashMap<NaiveDate, usize>,
}

impl MergedFrame {
    pub fn new(target_name: &str, columns: Vec<String>) -> Self {
        Self {
            target_name: target_name.to_string(),
            columns,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a row dated after every existing row.
    pub fn push(&mut self, row: FrameRow) -> Result<(), PricecastError> {
        if row.values.len() != self.columns.len() {
            return Err(PricecastError::FrameInvalid {
                reason: format!(
                    "row for {} has {} cells, frame has {} columns",
                    row.date,
                    row.values.len(),
                    self.columns.len()
                ),
            });
        }
        if let Some(last) = self.last_date() {
            if row.date <= last {
                return Err(PricecastError::FrameInvalid {
                    reason: format!("row for {} does not follow {}", row.date, last),
                });
            }
        }
        self.index.insert(row.date, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn last_row(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn row_at(&self, date: NaiveDate) -> Option<&FrameRow> {
        self.index.get(&date).map(|&i| &self.rows[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether `name` is the target or one of the covariate columns.
    pub fn has_series(&self, name: &str) -> bool {
        name == self.target_name || self.column_index(name).is_some()
    }

    /// Whether `name` has a defined value on at least one day.
    pub fn has_values(&self, name: &str) -> bool {
        if name == self.target_name {
            return self.rows.iter().any(|r| r.target.is_some());
        }
        self.column_index(name)
            .is_some_and(|i| self.rows.iter().any(|r| r.values[i].is_some()))
    }

    /// Value of the target or a covariate on `date`, if that day exists and
    /// the cell is defined.
    pub fn value(&self, date: NaiveDate, name: &str) -> Option<f64> {
        let row = self.row_at(date)?;
        if name == self.target_name {
            return row.target;
        }
        let idx = self.column_index(name)?;
        row.values[idx]
    }
}
