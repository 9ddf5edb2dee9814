//! Chronological hold-out evaluation and error metrics.

use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::ports::model_port::Regressor;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalPrediction {
    pub date: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: Metrics,
    pub train_rows: usize,
    pub predictions: Vec<EvalPrediction>,
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Coefficient of determination; 0 when the actual values have no variance.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

pub fn compute_metrics(actual: &[f64], predicted: &[f64]) -> Metrics {
    Metrics {
        mae: mean_absolute_error(actual, predicted),
        rmse: root_mean_squared_error(actual, predicted),
        r2: r2_score(actual, predicted),
    }
}

/// Fit `model` on the chronological prefix of `data` and score it on the
/// remaining suffix.
pub fn evaluate<R: Regressor + ?Sized>(
    model: &mut R,
    data: &Dataset,
    test_ratio: f64,
) -> Result<Evaluation, PricecastError> {
    let (train, test) = data.chronological_split(test_ratio)?;
    model.fit(&train)?;
    let predicted = model.predict(&test.features)?;
    let metrics = compute_metrics(&test.targets, &predicted);
    let predictions = test
        .dates
        .iter()
        .zip(&test.targets)
        .zip(&predicted)
        .map(|((&date, &actual), &predicted)| EvalPrediction {
            date,
            actual,
            predicted,
        })
        .collect();
    Ok(Evaluation {
        metrics,
        train_rows: train.n_samples(),
        predictions,
    })
}
