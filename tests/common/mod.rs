#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use pricecast::domain::error::PricecastError;
use pricecast::domain::normalizer::SourceKind;
use pricecast::domain::pipeline::PipelineConfig;
use pricecast::domain::table::RawTable;
use pricecast::ports::source_port::SourcePort;
use std::collections::HashMap;

pub const PRICE_HEADERS: [&str; 3] = ["Date", "कृषि उपज", "औसत"];
pub const SUPPLY_HEADERS: [&str; 3] = ["Date", "कृषि उपज", "आगमन"];
pub const BIG_TOMATO: &str = "गोलभेडा ठूलो(नेपाली)";
pub const SMALL_TOMATO: &str = "गोलभेडा सानो(तराई)";

pub struct MockSourcePort {
    pub tables: HashMap<SourceKind, RawTable>,
    pub errors: HashMap<SourceKind, String>,
}

impl MockSourcePort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_table(mut self, kind: SourceKind, table: RawTable) -> Self {
        self.tables.insert(kind, table);
        self
    }

    pub fn with_error(mut self, kind: SourceKind, reason: &str) -> Self {
        self.errors.insert(kind, reason.to_string());
        self
    }
}

impl SourcePort for MockSourcePort {
    fn read_table(&self, kind: SourceKind) -> Result<Option<RawTable>, PricecastError> {
        if let Some(reason) = self.errors.get(&kind) {
            return Err(PricecastError::SourceMalformed {
                source_name: kind.name().to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.tables.get(&kind).cloned())
    }

    fn describe(&self, kind: SourceKind) -> String {
        format!("mock://{kind}")
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(start: NaiveDate, offset: usize) -> NaiveDate {
    start + Days::new(offset as u64)
}

pub fn table(headers: &[&str], rows: Vec<Vec<String>>) -> RawTable {
    RawTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
}

/// Weekly cycle on a gentle upward trend.
pub fn seasonal_prices(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let phase = i as f64 * std::f64::consts::TAU / 7.0;
            50.0 + 8.0 * phase.sin() + 0.25 * i as f64
        })
        .collect()
}

/// Price list with one big-tomato row per day plus an unrelated commodity.
pub fn price_table(start: NaiveDate, prices: &[f64]) -> RawTable {
    let mut rows = Vec::with_capacity(prices.len() * 2);
    for (i, p) in prices.iter().enumerate() {
        let d = day(start, i).format("%Y-%m-%d").to_string();
        rows.push(vec![d.clone(), BIG_TOMATO.to_string(), format!("रू {p:.2}")]);
        rows.push(vec![d, "आलु रातो".to_string(), "रू 40".to_string()]);
    }
    table(&PRICE_HEADERS, rows)
}

pub fn supply_table(entries: &[(NaiveDate, &str, f64)]) -> RawTable {
    let rows = entries
        .iter()
        .map(|(d, name, v)| vec![d.format("%Y-%m-%d").to_string(), name.to_string(), v.to_string()])
        .collect();
    table(&SUPPLY_HEADERS, rows)
}

/// Two-column `Date,<value>` table such as fuel or exchange.
pub fn series_table(value_header: &str, entries: &[(NaiveDate, f64)]) -> RawTable {
    let rows = entries
        .iter()
        .map(|(d, v)| vec![d.format("%Y-%m-%d").to_string(), v.to_string()])
        .collect();
    table(&["Date", value_header], rows)
}

pub fn weather_table(start: NaiveDate, days: usize) -> RawTable {
    let rows = (0..days)
        .map(|i| {
            let rain = if i % 5 == 0 { String::new() } else { format!("{}", i % 3) };
            vec![
                day(start, i).format("%Y-%m-%d").to_string(),
                rain,
                format!("{:.1}", 18.0 + (i % 4) as f64),
            ]
        })
        .collect();
    table(&["Date", "Kavre_Rainfall_MM", "Kathmandu_Temp_C"], rows)
}

/// Defaults with small model sizes so tests stay quick.
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.training.model.forest.n_trees = 20;
    config.training.model.forest.max_depth = 8;
    config.training.model.boost.n_estimators = 30;
    config.training.model.boost.max_depth = 3;
    config.training.cv_splits = 2;
    config.training.grid.n_trees = vec![10];
    config.training.grid.max_depth = vec![4, 8];
    config.training.grid.min_samples_split = vec![2];
    config.training.grid.min_samples_leaf = vec![1, 2];
    config
}
