//! Supply (arrival) volumes. Sub-variants of the commodity are independent
//! arrivals, so they are summed per day rather than averaged.

use super::{
    CommodityColumns, NormalizedSource, SUPPLY_COLUMN, SourceKind, SourceNormalizer,
    require_column,
};
use crate::domain::cleaning::{CommodityAliases, clean_number, parse_date};
use crate::domain::error::PricecastError;
use crate::domain::table::{DailyTable, RawTable};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SupplyNormalizer {
    pub columns: CommodityColumns,
    pub aliases: CommodityAliases,
    pub variants: Vec<String>,
}

impl SourceNormalizer for SupplyNormalizer {
    fn source(&self) -> SourceKind {
        SourceKind::Supply
    }

    fn normalize(&self, raw: &RawTable) -> Result<NormalizedSource, PricecastError> {
        let date_col = require_column(raw, &self.columns.date, SourceKind::Supply)?;
        let name_col = require_column(raw, &self.columns.commodity, SourceKind::Supply)?;
        let volume_col = require_column(raw, &self.columns.value, SourceKind::Supply)?;

        let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut dropped = 0usize;

        for row in 0..raw.row_count() {
            let canonical = self.aliases.canonicalize(raw.cell(row, name_col));
            if !self.variants.iter().any(|v| *v == canonical) {
                continue;
            }
            match parse_date(raw.cell(row, date_col)).zip(clean_number(raw.cell(row, volume_col)))
            {
                Some((date, volume)) => *totals.entry(date).or_insert(0.0) += volume,
                None => dropped += 1,
            }
        }

        let mut table = DailyTable::new(vec![SUPPLY_COLUMN.to_string()]);
        for (date, total) in totals {
            table.insert(date, vec![Some(total)]);
        }

        debug!(days = table.len(), dropped, "normalized supply series");
        Ok(NormalizedSource {
            table,
            dropped_rows: dropped,
        })
    }
}
