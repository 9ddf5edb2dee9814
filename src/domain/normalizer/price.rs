//! Price records: one averaged price per day for the target commodity.

use super::{
    CommodityColumns, NormalizedSource, PRICE_COLUMN, SourceKind, SourceNormalizer,
    require_column,
};
use crate::domain::cleaning::{CommodityAliases, clean_number, parse_date};
use crate::domain::error::PricecastError;
use crate::domain::table::{DailyTable, RawTable};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PriceNormalizer {
    pub columns: CommodityColumns,
    pub aliases: CommodityAliases,
    pub target: String,
}

impl SourceNormalizer for PriceNormalizer {
    fn source(&self) -> SourceKind {
        SourceKind::Price
    }

    fn normalize(&self, raw: &RawTable) -> Result<NormalizedSource, PricecastError> {
        let date_col = require_column(raw, &self.columns.date, SourceKind::Price)?;
        let name_col = require_column(raw, &self.columns.commodity, SourceKind::Price)?;
        let price_col = require_column(raw, &self.columns.value, SourceKind::Price)?;

        let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        let mut dropped = 0usize;

        for row in 0..raw.row_count() {
            if self.aliases.canonicalize(raw.cell(row, name_col)) != self.target {
                continue;
            }
            let parsed = parse_date(raw.cell(row, date_col))
                .zip(clean_number(raw.cell(row, price_col)));
            match parsed {
                Some((date, price)) => {
                    let entry = sums.entry(date).or_insert((0.0, 0));
                    entry.0 += price;
                    entry.1 += 1;
                }
                None => dropped += 1,
            }
        }

        let mut table = DailyTable::new(vec![PRICE_COLUMN.to_string()]);
        for (date, (sum, count)) in sums {
            table.insert(date, vec![Some(sum / count as f64)]);
        }

        debug!(
            target_commodity = %self.target,
            days = table.len(),
            dropped,
            "normalized price series"
        );
        Ok(NormalizedSource {
            table,
            dropped_rows: dropped,
        })
    }
}
