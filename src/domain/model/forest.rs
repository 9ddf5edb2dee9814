//! Random forest regressor: bootstrapped regression trees trained in parallel.

use super::tree::{RegressionTree, TreeParams};
use super::{check_rows, normalize, require_samples};
use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::ports::model_port::Regressor;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; a third of the features when `None`.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 20,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Normalized impurity-based importances, aligned with the feature names.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn predict_one(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_one(row)).sum();
        total / self.trees.len() as f64
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, data: &Dataset) -> Result<(), PricecastError> {
        require_samples(data, "random forest fit")?;
        let n = data.n_samples();
        let n_features = data.n_features();
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: Some(
                self.params
                    .max_features
                    .unwrap_or((n_features / 3).max(1))
                    .min(n_features.max(1)),
            ),
        };
        let params = self.params;

        let trees: Vec<RegressionTree> = (0..params.n_trees.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(&data.features, &data.targets, &indices, &tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, imp) in importances.iter_mut().zip(tree.importances()) {
                *acc += imp;
            }
        }
        normalize(&mut importances);

        self.trees = trees;
        self.feature_names = data.feature_names.clone();
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, PricecastError> {
        if self.trees.is_empty() {
            return Err(PricecastError::ModelAlignment {
                reason: "random forest has not been fitted".to_string(),
            });
        }
        check_rows(rows, self.feature_names.len())?;
        Ok(rows.par_iter().map(|r| self.predict_one(r)).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
