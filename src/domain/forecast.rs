//! Recursive multi-step forecasting.
//!
//! Each future day is predicted from features computed against a working copy
//! of the history, then appended to that copy with the prediction as its
//! target so later days can lag on it. Covariates are carried forward from the
//! most recent known row.

use crate::domain::error::PricecastError;
use crate::domain::features::{FeatureConfig, FeatureLayout};
use crate::domain::frame::{FrameRow, MergedFrame};
use crate::domain::model::align_row;
use crate::ports::model_port::Regressor;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_HORIZON_DAYS: u32 = 7;

/// One predicted day. Created once, never updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    /// Defaults to the day after the last known date.
    pub start: Option<NaiveDate>,
    /// Defaults to `start + horizon_days - 1`.
    pub end: Option<NaiveDate>,
    pub horizon_days: u32,
    /// Also emit the days between the history and `start`.
    pub keep_lead_in: bool,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            horizon_days: DEFAULT_HORIZON_DAYS,
            keep_lead_in: false,
        }
    }
}

impl ForecastRequest {
    pub fn days(horizon_days: u32) -> Self {
        Self {
            horizon_days,
            ..Self::default()
        }
    }

    /// Concrete `(start, end)` for a history ending on `last`; `None` when the
    /// range is empty.
    pub fn resolve(&self, last: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = match self.start {
            Some(s) => s,
            None => last.checked_add_days(Days::new(1))?,
        };
        let end = match self.end {
            Some(e) => e,
            None => {
                if self.horizon_days == 0 {
                    return None;
                }
                start.checked_add_days(Days::new(u64::from(self.horizon_days) - 1))?
            }
        };
        (start <= end && end > last).then_some((start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastRun {
    pub forecasts: Vec<Forecast>,
    /// Feature cells filled with the neutral default across all steps.
    pub filled_cells: usize,
}

/// Predict every day from the day after `history` through the requested end.
///
/// `history` is never modified.
pub fn forecast_range<R: Regressor + ?Sized>(
    model: &R,
    history: &MergedFrame,
    features: &FeatureConfig,
    request: &ForecastRequest,
) -> Result<ForecastRun, PricecastError> {
    let model_names = model.feature_names();
    if model_names.is_empty() {
        return Err(PricecastError::ModelAlignment {
            reason: "model has no feature names".to_string(),
        });
    }
    let Some(last_row) = history.last_row() else {
        return Err(PricecastError::InsufficientHistory {
            stage: "forecast".to_string(),
            have: 0,
            need: 1,
        });
    };
    let last = last_row.date;
    let Some((start, end)) = request.resolve(last) else {
        info!(%last, "requested range has no days after the history");
        return Ok(ForecastRun::default());
    };

    let layout = FeatureLayout::new(history, features);
    let carried = last_row.values.clone();
    let mut working = history.clone();
    let mut run = ForecastRun::default();

    for date in last.iter_days().skip(1).take_while(|d| *d <= end) {
        let row = layout.row(&working, date, None, &carried);
        let (x, filled) = align_row(&row, &layout.names, model_names);
        run.filled_cells += filled;

        let value = model
            .predict(std::slice::from_ref(&x))?
            .first()
            .copied()
            .ok_or_else(|| PricecastError::ModelAlignment {
                reason: format!("model returned no prediction for {date}"),
            })?;
        if !value.is_finite() {
            return Err(PricecastError::ModelAlignment {
                reason: format!("non-finite prediction {value} for {date}"),
            });
        }
        debug!(%date, value, filled, "forecast step");

        working.push(FrameRow {
            date,
            target: Some(value),
            values: carried.clone(),
        })?;
        if date >= start || request.keep_lead_in {
            run.forecasts.push(Forecast { date, value });
        }
    }

    if run.filled_cells > 0 {
        warn!(
            cells = run.filled_cells,
            "filled undefined feature cells during forecasting"
        );
    }
    info!(
        days = run.forecasts.len(),
        %start,
        %end,
        "recursive forecast complete"
    );
    Ok(run)
}
