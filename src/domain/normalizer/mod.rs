//! Source normalizers: one raw input table in, one clean daily table out.
//!
//! Every source goes through the same [`SourceNormalizer`] contract so the
//! aligner never needs to know where a column came from:
//! - [`price::PriceNormalizer`]: target commodity, same-day entries averaged
//! - [`supply::SupplyNormalizer`]: commodity sub-variants summed per day
//! - [`weather::WeatherNormalizer`]: per-region columns with fill policy
//! - [`forward_fill::ForwardFillNormalizer`]: sparse series resampled daily

pub mod forward_fill;
pub mod price;
pub mod supply;
pub mod weather;

use crate::domain::error::PricecastError;
use crate::domain::table::{DailyTable, RawTable};
use std::fmt;

/// The input sources known to the pipeline, in join order after price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Price,
    Supply,
    Exchange,
    Fuel,
    Inflation,
    Weather,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Price,
        SourceKind::Supply,
        SourceKind::Exchange,
        SourceKind::Fuel,
        SourceKind::Inflation,
        SourceKind::Weather,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Price => "price",
            SourceKind::Supply => "supply",
            SourceKind::Exchange => "exchange",
            SourceKind::Fuel => "fuel",
            SourceKind::Inflation => "inflation",
            SourceKind::Weather => "weather",
        }
    }

    /// Only the price series defines the date axis; everything else is an
    /// optional enrichment.
    pub fn is_required(&self) -> bool {
        matches!(self, SourceKind::Price)
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            SourceKind::Price => "veg_price_list.csv",
            SourceKind::Supply => "supply_volume.csv",
            SourceKind::Exchange => "exchange.csv",
            SourceKind::Fuel => "fuel.csv",
            SourceKind::Inflation => "inflation.csv",
            SourceKind::Weather => "weather.csv",
        }
    }

    /// Column(s) this source contributes when it has no rows at all.
    pub fn fallback_columns(&self) -> &'static [&'static str] {
        match self {
            SourceKind::Price => &[PRICE_COLUMN],
            SourceKind::Supply => &[SUPPLY_COLUMN],
            SourceKind::Exchange => &[EXCHANGE_COLUMN],
            SourceKind::Fuel => &[FUEL_COLUMN],
            SourceKind::Inflation => &[INFLATION_COLUMN],
            SourceKind::Weather => &[],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const PRICE_COLUMN: &str = "Average_Price";
pub const SUPPLY_COLUMN: &str = "Supply_Volume";
pub const EXCHANGE_COLUMN: &str = "USD_TO_NPR";
pub const FUEL_COLUMN: &str = "Diesel";
pub const INFLATION_COLUMN: &str = "Inflation";

/// A normalized source and how many input rows were discarded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSource {
    pub table: DailyTable,
    pub dropped_rows: usize,
}

impl NormalizedSource {
    pub fn empty_for(kind: SourceKind) -> Self {
        Self {
            table: DailyTable::empty(kind.fallback_columns()),
            dropped_rows: 0,
        }
    }
}

/// Produce a daily series from one raw source table.
pub trait SourceNormalizer {
    fn source(&self) -> SourceKind;

    fn normalize(&self, raw: &RawTable) -> Result<NormalizedSource, PricecastError>;
}

/// Header names of a commodity-keyed table (price or supply).
#[derive(Debug, Clone, PartialEq)]
pub struct CommodityColumns {
    pub date: String,
    pub commodity: String,
    pub value: String,
}

pub(crate) fn require_column(
    raw: &RawTable,
    name: &str,
    source: SourceKind,
) -> Result<usize, PricecastError> {
    raw.column(name)
        .or_else(|| raw.column_ignore_case(name))
        .ok_or_else(|| PricecastError::SchemaMismatch {
            source_name: source.name().to_string(),
            column: name.to_string(),
        })
}
