//! Gradient boosting regressor with squared loss.
//!
//! Starts from the target mean and adds shallow trees fitted to the current
//! residuals, each scaled by the learning rate. With `subsample < 1` every
//! stage sees a random subset of rows drawn without replacement.

use super::tree::{RegressionTree, TreeParams};
use super::{check_rows, normalize, require_samples};
use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::ports::model_port::Regressor;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    params: BoostParams,
    init: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(params: BoostParams) -> Self {
        Self {
            params,
            init: 0.0,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn predict_one(&self, row: &[f64]) -> f64 {
        self.init
            + self.params.learning_rate
                * self.trees.iter().map(|t| t.predict_one(row)).sum::<f64>()
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, data: &Dataset) -> Result<(), PricecastError> {
        require_samples(data, "gradient boosting fit")?;
        let n = data.n_samples();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: None,
        };
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);

        let init = data.targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![init; n];
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; data.n_features()];
        let mut all: Vec<usize> = (0..n).collect();

        for _ in 0..self.params.n_estimators {
            for i in 0..n {
                residuals[i] = data.targets[i] - predictions[i];
            }
            let rows: &[usize] = if sample_size < n {
                all.shuffle(&mut rng);
                &all[..sample_size]
            } else {
                &all
            };
            let tree = RegressionTree::fit(&data.features, &residuals, rows, &tree_params, &mut rng);
            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += self.params.learning_rate * tree.predict_one(&data.features[i]);
            }
            for (acc, imp) in importances.iter_mut().zip(tree.importances()) {
                *acc += imp;
            }
            trees.push(tree);
        }
        normalize(&mut importances);

        self.init = init;
        self.trees = trees;
        self.feature_names = data.feature_names.clone();
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, PricecastError> {
        if self.feature_names.is_empty() && self.trees.is_empty() {
            return Err(PricecastError::ModelAlignment {
                reason: "gradient boosting model has not been fitted".to_string(),
            });
        }
        check_rows(rows, self.feature_names.len())?;
        Ok(rows.iter().map(|r| self.predict_one(r)).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn quadratic_dataset(n: usize) -> Dataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut ds = Dataset::new(vec!["x".into()]);
        for i in 0..n {
            let x = i as f64 / 10.0;
            ds.push(vec![x], x * x, start + Days::new(i as u64));
        }
        ds
    }

    fn mae(model: &GradientBoosting, data: &Dataset) -> f64 {
        let preds = model.predict(&data.features).unwrap();
        preds
            .iter()
            .zip(&data.targets)
            .map(|(p, y)| (p - y).abs())
            .sum::<f64>()
            / preds.len() as f64
    }

    #[test]
    fn more_stages_reduce_training_error() {
        let data = quadratic_dataset(50);
        let mut few = GradientBoosting::new(BoostParams {
            n_estimators: 3,
            ..BoostParams::default()
        });
        let mut many = GradientBoosting::new(BoostParams {
            n_estimators: 100,
            ..BoostParams::default()
        });
        few.fit(&data).unwrap();
        many.fit(&data).unwrap();
        assert!(mae(&many, &data) < mae(&few, &data));
        assert!(mae(&many, &data) < 0.5);
        assert_eq!(many.n_stages(), 100);
    }

    #[test]
    fn zero_stages_predicts_the_mean() {
        let data = quadratic_dataset(10);
        let mut model = GradientBoosting::new(BoostParams {
            n_estimators: 0,
            ..BoostParams::default()
        });
        model.fit(&data).unwrap();
        let mean = data.targets.iter().sum::<f64>() / 10.0;
        let pred = model.predict(&[vec![0.0]]).unwrap()[0];
        assert!((pred - mean).abs() < 1e-12);
    }

    #[test]
    fn subsampling_is_seeded() {
        let data = quadratic_dataset(40);
        let params = BoostParams {
            n_estimators: 20,
            subsample: 0.5,
            ..BoostParams::default()
        };
        let mut a = GradientBoosting::new(params);
        let mut b = GradientBoosting::new(params);
        a.fit(&data).unwrap();
        b.fit(&data).unwrap();
        assert_eq!(a, b);
    }
}
