//! Output artifact port trait.

use crate::domain::calendar::CalendarConfig;
use crate::domain::error::PricecastError;
use crate::domain::evaluation::EvalPrediction;
use crate::domain::forecast::Forecast;
use crate::domain::frame::MergedFrame;
use crate::domain::model::ModelKind;
use crate::domain::pruning::PruningReport;
use crate::domain::registry::RegistryEntry;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub trait ArtifactPort {
    /// Merged dataset with calendar columns; returns the written path.
    fn write_merged(
        &self,
        frame: &MergedFrame,
        calendar: &CalendarConfig,
    ) -> Result<PathBuf, PricecastError>;

    fn write_predictions(
        &self,
        file_name: &str,
        predictions: &[EvalPrediction],
    ) -> Result<PathBuf, PricecastError>;

    /// Forecast file at `path`, or the configured default location.
    fn write_forecast(
        &self,
        forecasts: &[Forecast],
        path: Option<&Path>,
    ) -> Result<PathBuf, PricecastError>;

    /// Append one row, creating the registry with a header if needed.
    fn append_registry(&self, entry: &RegistryEntry) -> Result<PathBuf, PricecastError>;

    /// Baseline importances, selected features, the metric comparison and
    /// side-by-side hold-out predictions of one pruning run.
    fn write_pruning_report(
        &self,
        kind: ModelKind,
        date: NaiveDate,
        report: &PruningReport,
    ) -> Result<Vec<PathBuf>, PricecastError>;
}
