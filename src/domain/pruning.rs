//! Feature pruning by recursive elimination.
//!
//! A baseline model is evaluated on every feature. The training prefix is
//! then refitted repeatedly, dropping the least important feature each round
//! until the requested number remain, and a refined model is evaluated on the
//! surviving subset over the same chronological split.

use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::domain::evaluation::{Evaluation, evaluate};
use crate::domain::model::{ModelConfig, ModelKind, TrainedModel};
use crate::ports::model_port::Regressor;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PruningReport {
    pub baseline: Evaluation,
    pub refined: Evaluation,
    /// Baseline importances, most important first.
    pub baseline_importances: Vec<(String, f64)>,
    /// Surviving features in their original dataset order.
    pub selected: Vec<String>,
}

impl PruningReport {
    /// Relative MAE change in percent; positive when pruning helped.
    pub fn mae_improvement_pct(&self) -> f64 {
        let base = self.baseline.metrics.mae;
        if base <= f64::EPSILON {
            return 0.0;
        }
        (base - self.refined.metrics.mae) / base * 100.0
    }
}

fn require_keep(keep: usize) -> Result<(), PricecastError> {
    if keep == 0 {
        return Err(PricecastError::ConfigInvalid {
            section: "model".to_string(),
            key: "prune_features".to_string(),
            reason: "must keep at least 1 feature".to_string(),
        });
    }
    Ok(())
}

/// Drop the least important feature one at a time until `keep` remain.
///
/// Ties go to the earliest column. Returns the survivors in dataset order.
pub fn eliminate_features(
    data: &Dataset,
    kind: ModelKind,
    config: &ModelConfig,
    keep: usize,
) -> Result<Vec<String>, PricecastError> {
    require_keep(keep)?;
    let mut current = data.clone();
    while current.n_features() > keep {
        let mut model = TrainedModel::new(kind, config);
        model.fit(&current)?;
        let Some((weakest, importance)) = model
            .feature_importances()
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
        else {
            break;
        };
        debug!(
            feature = %current.feature_names[weakest],
            importance,
            remaining = current.n_features() - 1,
            "eliminated feature"
        );
        let survivors: Vec<String> = current
            .feature_names
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != weakest)
            .map(|(_, name)| name.clone())
            .collect();
        current = current.select_features(&survivors)?;
    }
    Ok(current.feature_names)
}

/// Compare a model on every feature against one on the `keep` features that
/// survive recursive elimination on the training prefix.
pub fn prune_features(
    data: &Dataset,
    kind: ModelKind,
    config: &ModelConfig,
    keep: usize,
    test_ratio: f64,
) -> Result<PruningReport, PricecastError> {
    require_keep(keep)?;
    let mut baseline_model = TrainedModel::new(kind, config);
    let baseline = evaluate(&mut baseline_model, data, test_ratio)?;
    let baseline_importances = baseline_model.importance_ranking();

    let selected = if keep >= data.n_features() {
        info!(
            model = %kind,
            features = data.n_features(),
            keep,
            "nothing to prune"
        );
        data.feature_names.clone()
    } else {
        let (train, _) = data.chronological_split(test_ratio)?;
        eliminate_features(&train, kind, config, keep)?
    };

    let pruned = data.select_features(&selected)?;
    let mut refined_model = TrainedModel::new(kind, config);
    let refined = evaluate(&mut refined_model, &pruned, test_ratio)?;

    let report = PruningReport {
        baseline,
        refined,
        baseline_importances,
        selected,
    };
    info!(
        model = %kind,
        from = data.n_features(),
        to = report.selected.len(),
        baseline_mae = report.baseline.metrics.mae,
        refined_mae = report.refined.metrics.mae,
        improvement_pct = report.mae_improvement_pct(),
        "feature pruning finished"
    );
    Ok(report)
}
