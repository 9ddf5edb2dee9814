//! Regression model port trait.

use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::domain::model::{ModelKind, TrainedModel};
use std::path::{Path, PathBuf};

/// A trainable regressor that remembers the feature names it was fitted on.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, data: &Dataset) -> Result<(), PricecastError>;

    /// Predict one value per row. Each row must follow [`Regressor::feature_names`].
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, PricecastError>;

    fn feature_names(&self) -> &[String];
}

/// Persistence for trained models.
pub trait ModelStore {
    fn save(&self, model: &TrainedModel, file_name: &str) -> Result<PathBuf, PricecastError>;

    fn load(&self, path: &Path) -> Result<TrainedModel, PricecastError>;

    /// Most recently saved model of `kind`, if any.
    fn latest(&self, kind: ModelKind) -> Result<Option<PathBuf>, PricecastError>;
}
