//! Temporal feature engineering over a [`MergedFrame`].
//!
//! Lag and rolling values are keyed by calendar date, never by row position:
//! `f_lag<k>` on day `d` is `f` on day `d - k`, and `f_rollmean_<w>` is the
//! mean of `f` over the `w` days strictly before `d`. Either is undefined when
//! any day it needs is absent from the frame or has no value.

use crate::domain::calendar::{CALENDAR_FEATURES, CalendarConfig, CalendarFields};
use crate::domain::frame::MergedFrame;
use crate::domain::normalizer::{PRICE_COLUMN, SUPPLY_COLUMN};
use chrono::{Days, NaiveDate};
use tracing::debug;

/// Lags and rolling windows derived for one base series.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSpec {
    pub feature: String,
    pub lags: Vec<u32>,
    pub windows: Vec<u32>,
}

impl TemporalSpec {
    pub fn new(feature: &str, lags: &[u32], windows: &[u32]) -> Self {
        Self {
            feature: feature.to_string(),
            lags: lags.to_vec(),
            windows: windows.to_vec(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let lags = self.lags.iter().map(|k| format!("{}_lag{}", self.feature, k));
        let rolls = self
            .windows
            .iter()
            .map(|w| format!("{}_rollmean_{}", self.feature, w));
        lags.chain(rolls).collect()
    }

    /// Days of history needed before the first fully defined row.
    pub fn lookback(&self) -> u32 {
        self.lags
            .iter()
            .chain(self.windows.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

pub const DEFAULT_LAGS: [u32; 3] = [1, 3, 7];
pub const DEFAULT_WINDOWS: [u32; 2] = [7, 30];

pub const DEFAULT_BASE_FEATURES: [&str; 6] = [
    PRICE_COLUMN,
    SUPPLY_COLUMN,
    "Dhading_Rainfall_MM",
    "Kathmandu_Rainfall_MM",
    "Kavre_Rainfall_MM",
    "Sarlahi_Rainfall_MM",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub specs: Vec<TemporalSpec>,
    pub calendar: CalendarConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            specs: DEFAULT_BASE_FEATURES
                .iter()
                .map(|f| TemporalSpec::new(f, &DEFAULT_LAGS, &DEFAULT_WINDOWS))
                .collect(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl FeatureConfig {
    pub fn max_lookback(&self) -> u32 {
        self.specs.iter().map(TemporalSpec::lookback).max().unwrap_or(0)
    }
}

/// Lag `k` of `feature` on `date`.
pub fn lag_value(frame: &MergedFrame, feature: &str, date: NaiveDate, k: u32) -> Option<f64> {
    let day = date.checked_sub_days(Days::new(u64::from(k)))?;
    frame.value(day, feature)
}

/// Mean of `feature` over the `window` days before `date`; `date` itself
/// never contributes.
pub fn rolling_mean(
    frame: &MergedFrame,
    feature: &str,
    date: NaiveDate,
    window: u32,
) -> Option<f64> {
    if window == 0 {
        return None;
    }
    let mut sum = 0.0;
    for offset in 1..=window {
        sum += lag_value(frame, feature, date, offset)?;
    }
    Some(sum / f64::from(window))
}

/// One row of model inputs; `values` is aligned with the owning layout's
/// feature names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub target: Option<f64>,
    pub values: Vec<Option<f64>>,
    pub fiscal_year: String,
}

/// Feature-name order for a frame: covariates, calendar fields, then the
/// temporal features of every base series the frame actually carries.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLayout {
    pub names: Vec<String>,
    pub specs: Vec<TemporalSpec>,
    pub calendar: CalendarConfig,
    temporal_start: usize,
}

impl FeatureLayout {
    pub fn new(frame: &MergedFrame, config: &FeatureConfig) -> Self {
        let specs: Vec<TemporalSpec> = config
            .specs
            .iter()
            .filter(|spec| {
                let present = frame.has_values(&spec.feature);
                if !present {
                    debug!(feature = %spec.feature, "base feature has no values, skipping");
                }
                present
            })
            .cloned()
            .collect();

        let mut names = frame.columns.clone();
        names.extend(CALENDAR_FEATURES.iter().map(|c| c.to_string()));
        let temporal_start = names.len();
        names.extend(specs.iter().flat_map(TemporalSpec::names));

        Self {
            names,
            specs,
            calendar: config.calendar.clone(),
            temporal_start,
        }
    }

    pub fn temporal_names(&self) -> &[String] {
        &self.names[self.temporal_start..]
    }

    /// Features for `date` computed against `frame`. The frame is read only
    /// for strictly earlier days.
    pub fn row(
        &self,
        frame: &MergedFrame,
        date: NaiveDate,
        target: Option<f64>,
        covariates: &[Option<f64>],
    ) -> FeatureRow {
        let calendar = CalendarFields::for_date(date, &self.calendar);
        let mut values = Vec::with_capacity(self.names.len());
        values.extend_from_slice(covariates);
        values.extend(calendar.numeric_values().into_iter().map(Some));
        for spec in &self.specs {
            for &k in &spec.lags {
                values.push(lag_value(frame, &spec.feature, date, k));
            }
            for &w in &spec.windows {
                values.push(rolling_mean(frame, &spec.feature, date, w));
            }
        }
        FeatureRow {
            date,
            target,
            values,
            fiscal_year: calendar.fiscal_year,
        }
    }

    /// A row can train a model when its target and every temporal feature
    /// are defined.
    pub fn is_trainable(&self, row: &FeatureRow) -> bool {
        row.target.is_some() && row.values[self.temporal_start..].iter().all(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub layout: FeatureLayout,
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn trainable_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|r| self.layout.is_trainable(r))
    }
}

/// Derive features for every row of `frame`.
pub fn build_features(frame: &MergedFrame, config: &FeatureConfig) -> FeatureFrame {
    let layout = FeatureLayout::new(frame, config);
    let rows: Vec<FeatureRow> = frame
        .rows()
        .iter()
        .map(|r| layout.row(frame, r.date, r.target, &r.values))
        .collect();
    let features = FeatureFrame { layout, rows };
    debug!(
        rows = features.rows.len(),
        trainable = features.trainable_rows().count(),
        features = features.layout.names.len(),
        "built feature frame"
    );
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::FrameRow;
    use approx::assert_relative_eq;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(u64::from(d))
    }

    fn price_frame(prices: &[(u32, f64)]) -> MergedFrame {
        let mut frame = MergedFrame::new(PRICE_COLUMN, vec![SUPPLY_COLUMN.into()]);
        for &(d, p) in prices {
            frame
                .push(FrameRow {
                    date: date(d),
                    target: Some(p),
                    values: vec![Some(p * 10.0)],
                })
                .unwrap();
        }
        frame
    }

    #[test]
    fn lag_reads_exact_calendar_day() {
        let frame = price_frame(&[(0, 10.0), (1, 11.0), (2, 12.0), (3, 13.0)]);
        assert_eq!(lag_value(&frame, PRICE_COLUMN, date(3), 1), Some(12.0));
        assert_eq!(lag_value(&frame, PRICE_COLUMN, date(3), 3), Some(10.0));
        assert_eq!(lag_value(&frame, SUPPLY_COLUMN, date(3), 1), Some(120.0));
    }

    #[test]
    fn lag_is_undefined_across_gap() {
        let frame = price_frame(&[(0, 10.0), (2, 12.0), (3, 13.0)]);
        assert_eq!(lag_value(&frame, PRICE_COLUMN, date(2), 1), None);
        assert_eq!(rolling_mean(&frame, PRICE_COLUMN, date(3), 3), None);
    }

    #[test]
    fn rolling_mean_excludes_current_day() {
        let mut prices: Vec<(u32, f64)> = (0..7).map(|d| (d, 1.0)).collect();
        prices.push((7, 1_000_000.0));
        let frame = price_frame(&prices);
        assert_relative_eq!(rolling_mean(&frame, PRICE_COLUMN, date(7), 7).unwrap(), 1.0);
    }

    #[test]
    fn rolling_mean_needs_full_window() {
        let frame = price_frame(&[(0, 1.0), (1, 2.0), (2, 3.0)]);
        assert_eq!(rolling_mean(&frame, PRICE_COLUMN, date(2), 7), None);
        assert_relative_eq!(
            rolling_mean(&frame, PRICE_COLUMN, date(2), 2).unwrap(),
            1.5
        );
    }

    #[test]
    fn layout_orders_covariates_calendar_then_temporal() {
        let frame = price_frame(&[(0, 1.0)]);
        let layout = FeatureLayout::new(&frame, &FeatureConfig::default());
        assert_eq!(layout.names[0], SUPPLY_COLUMN);
        assert_eq!(layout.names[1], "day");
        assert_eq!(layout.temporal_names()[0], "Average_Price_lag1");
        assert!(layout.names.contains(&"Supply_Volume_rollmean_30".to_string()));
        // Rainfall series are absent from this frame.
        assert!(!layout.names.iter().any(|n| n.contains("Rainfall")));
    }

    #[test]
    fn trainable_rows_need_full_lookback() {
        let prices: Vec<(u32, f64)> = (0..40).map(|d| (d, 50.0 + d as f64)).collect();
        let frame = price_frame(&prices);
        let features = build_features(&frame, &FeatureConfig::default());
        assert_eq!(features.rows.len(), 40);
        assert_eq!(features.trainable_rows().count(), 10);
        assert_eq!(features.trainable_rows().next().unwrap().date, date(30));
    }

    #[test]
    fn empty_covariate_gets_no_temporal_features() {
        let mut frame = MergedFrame::new(PRICE_COLUMN, vec![SUPPLY_COLUMN.into()]);
        for d in 0..40 {
            frame
                .push(FrameRow {
                    date: date(d),
                    target: Some(50.0 + d as f64),
                    values: vec![None],
                })
                .unwrap();
        }
        let features = build_features(&frame, &FeatureConfig::default());
        assert!(!features.layout.temporal_names().iter().any(|n| n.starts_with(SUPPLY_COLUMN)));
        assert_eq!(features.trainable_rows().count(), 10);
    }

    #[test]
    fn spec_names_and_lookback() {
        let spec = TemporalSpec::new("Kavre_Rainfall_MM", &[1, 14], &[7]);
        assert_eq!(
            spec.names(),
            vec![
                "Kavre_Rainfall_MM_lag1",
                "Kavre_Rainfall_MM_lag14",
                "Kavre_Rainfall_MM_rollmean_7"
            ]
        );
        assert_eq!(spec.lookback(), 14);
    }
}
