//! JSON file persistence for trained models.

use crate::domain::error::PricecastError;
use crate::domain::model::{ModelKind, TrainedModel};
use crate::ports::model_port::{ModelStore, Regressor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const FORMAT_VERSION: u32 = 1;

/// On-disk envelope. The feature list is duplicated outside the model so a
/// loaded file can be checked before it is used.
#[derive(Serialize, Deserialize)]
struct StoredModel {
    format_version: u32,
    feature_names: Vec<String>,
    model: TrainedModel,
}

pub struct JsonModelStore {
    dir: PathBuf,
}

impl JsonModelStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn store_error(reason: impl Into<String>) -> PricecastError {
    PricecastError::ModelStore {
        reason: reason.into(),
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, model: &TrainedModel, file_name: &str) -> Result<PathBuf, PricecastError> {
        if model.feature_names().is_empty() {
            return Err(store_error("refusing to save a model that has not been fitted"));
        }
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        let stored = StoredModel {
            format_version: FORMAT_VERSION,
            feature_names: model.feature_names().to_vec(),
            model: model.clone(),
        };
        let json = serde_json::to_string(&stored)
            .map_err(|e| store_error(format!("failed to encode model: {e}")))?;
        fs::write(&path, json)?;
        info!(path = %path.display(), kind = %model.kind(), "saved model");
        Ok(path)
    }

    fn load(&self, path: &Path) -> Result<TrainedModel, PricecastError> {
        let content = fs::read_to_string(path)
            .map_err(|e| store_error(format!("cannot read {}: {e}", path.display())))?;
        let stored: StoredModel = serde_json::from_str(&content)
            .map_err(|e| store_error(format!("cannot decode {}: {e}", path.display())))?;
        if stored.format_version != FORMAT_VERSION {
            return Err(store_error(format!(
                "{} has format version {}, expected {}",
                path.display(),
                stored.format_version,
                FORMAT_VERSION
            )));
        }
        if stored.feature_names != stored.model.feature_names() {
            return Err(PricecastError::ModelAlignment {
                reason: format!(
                    "{} lists features that differ from the fitted model",
                    path.display()
                ),
            });
        }
        Ok(stored.model)
    }

    fn latest(&self, kind: ModelKind) -> Result<Option<PathBuf>, PricecastError> {
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let prefix = format!("{}_", kind.name());
        let mut newest: Option<(String, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            // Names carry an ISO date, so lexical order is chronological.
            if newest.as_ref().is_none_or(|(best, _)| name > *best) {
                newest = Some((name, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}
