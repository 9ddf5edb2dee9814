//! Hyperparameter search with expanding-window time-series cross-validation.

use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::domain::evaluation::mean_absolute_error;
use crate::domain::model::{ModelConfig, ModelKind, TrainedModel};
use crate::ports::model_port::Regressor;
use std::ops::Range;
use tracing::{debug, info};

/// One train/test fold over row positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

/// Expanding-window splits: `n_splits` consecutive test blocks of
/// `n / (n_splits + 1)` rows at the end of the series, each trained on
/// everything before it.
pub fn time_series_splits(n: usize, n_splits: usize) -> Result<Vec<Fold>, PricecastError> {
    let test_size = if n_splits == 0 { 0 } else { n / (n_splits + 1) };
    if test_size == 0 {
        return Err(PricecastError::InsufficientHistory {
            stage: format!("{n_splits}-fold time-series cross-validation"),
            have: n,
            need: n_splits.max(1) + 1,
        });
    }
    let first_test = n - n_splits * test_size;
    Ok((0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            Fold {
                train: 0..start,
                test: start..start + test_size,
            }
        })
        .collect())
}

/// Candidate values per hyperparameter; every combination is scored.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

/// Depth used for "no limit" in a grid.
pub const UNLIMITED_DEPTH: usize = usize::MAX;

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![100, 200],
            max_depth: vec![10, 20, UNLIMITED_DEPTH],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ParamGrid {
    pub fn combinations(&self, kind: ModelKind, base: &ModelConfig) -> Vec<ModelConfig> {
        let mut out = Vec::new();
        for &n_trees in &self.n_trees {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        let mut config = *base;
                        match kind {
                            ModelKind::RandomForest => {
                                config.forest.n_trees = n_trees;
                                config.forest.max_depth = max_depth;
                                config.forest.min_samples_split = min_samples_split;
                                config.forest.min_samples_leaf = min_samples_leaf;
                            }
                            ModelKind::GradientBoost => {
                                config.boost.n_estimators = n_trees;
                                config.boost.max_depth = max_depth;
                                config.boost.min_samples_split = min_samples_split;
                                config.boost.min_samples_leaf = min_samples_leaf;
                            }
                        }
                        out.push(config);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuningResult {
    pub config: ModelConfig,
    /// Mean MAE across folds.
    pub score: f64,
    pub candidates: usize,
}

/// Score every grid combination by mean fold MAE and keep the lowest.
pub fn grid_search(
    data: &Dataset,
    kind: ModelKind,
    base: &ModelConfig,
    grid: &ParamGrid,
    n_splits: usize,
) -> Result<TuningResult, PricecastError> {
    let folds = time_series_splits(data.n_samples(), n_splits)?;
    let candidates = grid.combinations(kind, base);
    info!(
        model = %kind,
        candidates = candidates.len(),
        folds = folds.len(),
        "starting grid search"
    );

    let mut best: Option<(ModelConfig, f64)> = None;
    for config in &candidates {
        let mut total = 0.0;
        for fold in &folds {
            let train = data.slice(fold.train.clone());
            let test = data.slice(fold.test.clone());
            let mut model = TrainedModel::new(kind, config);
            model.fit(&train)?;
            let preds = model.predict(&test.features)?;
            total += mean_absolute_error(&test.targets, &preds);
        }
        let score = total / folds.len() as f64;
        debug!(model = %kind, score, "scored candidate");
        if best.as_ref().is_none_or(|(_, s)| score < *s) {
            best = Some((*config, score));
        }
    }

    let (config, score) = best.ok_or_else(|| PricecastError::ConfigInvalid {
        section: "model".to_string(),
        key: "grid".to_string(),
        reason: "parameter grid is empty".to_string(),
    })?;
    info!(model = %kind, score, "grid search finished");
    Ok(TuningResult {
        config,
        score,
        candidates: candidates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    #[test]
    fn splits_expand_and_never_overlap() {
        let folds = time_series_splits(12, 3).unwrap();
        assert_eq!(
            folds,
            vec![
                Fold { train: 0..3, test: 3..6 },
                Fold { train: 0..6, test: 6..9 },
                Fold { train: 0..9, test: 9..12 },
            ]
        );
    }

    #[test]
    fn remainder_goes_to_first_training_block() {
        let folds = time_series_splits(14, 3).unwrap();
        assert_eq!(folds[0].train, 0..5);
        assert_eq!(folds[2].test, 11..14);
    }

    #[test]
    fn too_few_rows_is_insufficient_history() {
        assert!(matches!(
            time_series_splits(3, 5),
            Err(PricecastError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn grid_combinations_cover_every_value() {
        let grid = ParamGrid::default();
        let configs = grid.combinations(ModelKind::RandomForest, &ModelConfig::default());
        assert_eq!(configs.len(), 54);
        assert!(configs.iter().any(|c| c.forest.max_depth == UNLIMITED_DEPTH));
    }

    #[test]
    fn grid_search_prefers_deeper_trees_on_nonlinear_data() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut data = Dataset::new(vec!["x".into()]);
        for i in 0..60 {
            let x = (i % 12) as f64;
            data.push(vec![x], (x * 0.8).sin() * 10.0, start + Days::new(i));
        }
        let grid = ParamGrid {
            n_trees: vec![10],
            max_depth: vec![1, 6],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        };
        let result =
            grid_search(&data, ModelKind::RandomForest, &ModelConfig::default(), &grid, 3).unwrap();
        assert_eq!(result.candidates, 2);
        assert_eq!(result.config.forest.max_depth, 6);
    }
}
