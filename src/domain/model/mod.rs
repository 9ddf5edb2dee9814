//! Forecast models behind the [`Regressor`] port.
//!
//! Two concrete regressors share one CART implementation:
//! [`forest::RandomForest`] and [`boosting::GradientBoosting`]. A
//! [`TrainedModel`] wraps either so the pipeline and the model store can
//! handle them uniformly.

pub mod boosting;
pub mod forest;
pub mod tree;

use crate::domain::dataset::{Dataset, MISSING_FILL};
use crate::domain::error::PricecastError;
use crate::domain::features::FeatureRow;
use crate::ports::model_port::Regressor;
use boosting::{BoostParams, GradientBoosting};
use forest::{ForestParams, RandomForest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::RandomForest, ModelKind::GradientBoost];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoost => "gradient_boost",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "gradient_boost" | "gradient_boosting" | "gbm" => Ok(ModelKind::GradientBoost),
            other => Err(format!(
                "unknown model '{other}' (expected random_forest or gradient_boost)"
            )),
        }
    }
}

/// Hyperparameters for every model kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelConfig {
    pub forest: ForestParams,
    pub boost: BoostParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoost(GradientBoosting),
}

impl TrainedModel {
    /// An unfitted model of `kind`.
    pub fn new(kind: ModelKind, config: &ModelConfig) -> Self {
        match kind {
            ModelKind::RandomForest => TrainedModel::RandomForest(RandomForest::new(config.forest)),
            ModelKind::GradientBoost => {
                TrainedModel::GradientBoost(GradientBoosting::new(config.boost))
            }
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoost(_) => ModelKind::GradientBoost,
        }
    }

    pub fn feature_importances(&self) -> &[f64] {
        match self {
            TrainedModel::RandomForest(m) => m.feature_importances(),
            TrainedModel::GradientBoost(m) => m.feature_importances(),
        }
    }

    /// Feature names paired with importances, most important first.
    pub fn importance_ranking(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_names()
            .iter()
            .cloned()
            .zip(self.feature_importances().iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoost(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn fit(&mut self, data: &Dataset) -> Result<(), PricecastError> {
        self.inner_mut().fit(data)
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, PricecastError> {
        self.inner().predict(rows)
    }

    fn feature_names(&self) -> &[String] {
        self.inner().feature_names()
    }
}

/// Map a feature row onto the model's feature order.
///
/// Columns the model knows but the row lacks, or that are undefined on this
/// row, take [`MISSING_FILL`]. Returns the aligned values and how many cells
/// were filled.
pub fn align_row(row: &FeatureRow, row_names: &[String], model_names: &[String]) -> (Vec<f64>, usize) {
    let positions: HashMap<&str, usize> = row_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut filled = 0usize;
    let values = model_names
        .iter()
        .map(|name| {
            match positions
                .get(name.as_str())
                .and_then(|&i| row.values.get(i).copied().flatten())
            {
                Some(v) => v,
                None => {
                    filled += 1;
                    MISSING_FILL
                }
            }
        })
        .collect();
    (values, filled)
}

pub(crate) fn require_samples(data: &Dataset, stage: &str) -> Result<(), PricecastError> {
    if data.is_empty() {
        return Err(PricecastError::InsufficientHistory {
            stage: stage.to_string(),
            have: 0,
            need: 1,
        });
    }
    Ok(())
}

pub(crate) fn check_rows(rows: &[Vec<f64>], width: usize) -> Result<(), PricecastError> {
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(PricecastError::ModelAlignment {
            reason: format!("row has {} values, model expects {}", bad.len(), width),
        });
    }
    Ok(())
}

pub(crate) fn normalize(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}
