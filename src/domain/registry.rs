//! Model registry rows and artifact naming.

use crate::domain::evaluation::Metrics;
use crate::domain::model::ModelKind;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of the append-only registry CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(rename = "Trained_At")]
    pub trained_at: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "R2")]
    pub r2: f64,
    #[serde(rename = "Model_Path")]
    pub model_path: String,
    #[serde(rename = "Predictions_Path")]
    pub predictions_path: String,
}

impl RegistryEntry {
    pub fn new(
        trained_at: NaiveDateTime,
        kind: ModelKind,
        metrics: &Metrics,
        model_path: &str,
        predictions_path: &str,
    ) -> Self {
        Self {
            trained_at: trained_at.format(TIMESTAMP_FORMAT).to_string(),
            model: kind.name().to_string(),
            mae: round3(metrics.mae),
            rmse: round3(metrics.rmse),
            r2: round3(metrics.r2),
            model_path: model_path.to_string(),
            predictions_path: predictions_path.to_string(),
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// `<kind>_<YYYY-MM-DD>.json`
pub fn model_file_name(kind: ModelKind, date: NaiveDate) -> String {
    format!("{}_{}.json", kind.name(), date.format("%Y-%m-%d"))
}

/// `predictions_<kind>_<YYYY-MM-DD>.csv`
pub fn predictions_file_name(kind: ModelKind, date: NaiveDate) -> String {
    format!("predictions_{}_{}.csv", kind.name(), date.format("%Y-%m-%d"))
}

/// Files written for one pruning run.
pub const PRUNING_ARTIFACTS: [&str; 4] = [
    "feature_importances_baseline",
    "selected_features",
    "model_comparison",
    "predictions_comparison",
];

/// `<stem>_<kind>_<YYYY-MM-DD>.csv`
pub fn pruning_file_name(stem: &str, kind: ModelKind, date: NaiveDate) -> String {
    format!("{stem}_{}_{}.csv", kind.name(), date.format("%Y-%m-%d"))
}
