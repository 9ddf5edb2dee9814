//! CSV output artifacts: merged dataset, hold-out predictions, forecasts,
//! pruning reports and the model registry.

use crate::domain::calendar::{CalendarConfig, CalendarFields, Season};
use crate::domain::error::PricecastError;
use crate::domain::evaluation::EvalPrediction;
use crate::domain::forecast::Forecast;
use crate::domain::frame::MergedFrame;
use crate::domain::model::ModelKind;
use crate::domain::pipeline::OutputConfig;
use crate::domain::pruning::PruningReport;
use crate::domain::registry::{PRUNING_ARTIFACTS, RegistryEntry, pruning_file_name};
use crate::ports::artifact_port::ArtifactPort;
use chrono::NaiveDate;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

const MERGED_CALENDAR_HEADERS: [&str; 12] = [
    "is_festival",
    "Season_Autumn",
    "Season_Monsoon",
    "Season_Spring",
    "Season_Winter",
    "day",
    "month",
    "day_of_week",
    "is_weekend",
    "month_sin",
    "month_cos",
    "Fiscal_Year",
];

#[derive(Serialize)]
struct PredictionRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Actual")]
    actual: f64,
    #[serde(rename = "Predicted")]
    predicted: f64,
}

#[derive(Serialize)]
struct ForecastRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Predicted_Price")]
    predicted_price: f64,
}

#[derive(Serialize)]
struct ImportanceRecord<'a> {
    #[serde(rename = "Feature")]
    feature: &'a str,
    #[serde(rename = "Importance")]
    importance: f64,
}

#[derive(Serialize)]
struct SelectedRecord<'a> {
    #[serde(rename = "Feature")]
    feature: &'a str,
}

#[derive(Serialize)]
struct ComparisonRecord {
    #[serde(rename = "Metric")]
    metric: &'static str,
    #[serde(rename = "Baseline")]
    baseline: f64,
    #[serde(rename = "Refined")]
    refined: f64,
}

#[derive(Serialize)]
struct PredictionComparisonRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Actual")]
    actual: f64,
    #[serde(rename = "Predicted_Baseline")]
    predicted_baseline: f64,
    #[serde(rename = "Predicted_Refined")]
    predicted_refined: f64,
}

pub struct CsvArtifactAdapter {
    output: OutputConfig,
}

impl CsvArtifactAdapter {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }
}

fn csv_error(e: csv::Error) -> PricecastError {
    PricecastError::Io(e.into())
}

fn ensure_parent(path: &Path) -> Result<(), PricecastError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_records<T: Serialize>(
    path: &Path,
    records: impl IntoIterator<Item = T>,
) -> Result<(), PricecastError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
    for record in records {
        wtr.serialize(record).map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

impl ArtifactPort for CsvArtifactAdapter {
    fn write_merged(
        &self,
        frame: &MergedFrame,
        calendar: &CalendarConfig,
    ) -> Result<PathBuf, PricecastError> {
        let path = self.output.dir.join(&self.output.merged_file);
        ensure_parent(&path)?;
        let mut wtr = csv::Writer::from_path(&path).map_err(csv_error)?;

        let mut header = vec!["Date".to_string(), frame.target_name.clone()];
        header.extend(frame.columns.iter().cloned());
        header.extend(MERGED_CALENDAR_HEADERS.iter().map(|h| h.to_string()));
        wtr.write_record(&header).map_err(csv_error)?;

        for row in frame.rows() {
            let fields = CalendarFields::for_date(row.date, calendar);
            let mut record = vec![row.date.format("%Y-%m-%d").to_string(), cell(row.target)];
            record.extend(row.values.iter().map(|v| cell(*v)));
            record.push(flag(fields.is_festival));
            for season in [Season::Autumn, Season::Monsoon, Season::Spring, Season::Winter] {
                record.push(flag(fields.season == season));
            }
            record.push(fields.day.to_string());
            record.push(fields.month.to_string());
            record.push(fields.day_of_week.to_string());
            record.push(flag(fields.is_weekend));
            record.push(fields.month_sin.to_string());
            record.push(fields.month_cos.to_string());
            record.push(fields.fiscal_year);
            wtr.write_record(&record).map_err(csv_error)?;
        }
        wtr.flush()?;
        info!(path = %path.display(), rows = frame.len(), "wrote merged dataset");
        Ok(path)
    }

    fn write_predictions(
        &self,
        file_name: &str,
        predictions: &[EvalPrediction],
    ) -> Result<PathBuf, PricecastError> {
        let path = self.output.results_dir().join(file_name);
        ensure_parent(&path)?;
        let mut wtr = csv::Writer::from_path(&path).map_err(csv_error)?;
        for p in predictions {
            wtr.serialize(PredictionRecord {
                date: p.date.format("%Y-%m-%d").to_string(),
                actual: p.actual,
                predicted: p.predicted,
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(path)
    }

    fn write_forecast(
        &self,
        forecasts: &[Forecast],
        path: Option<&Path>,
    ) -> Result<PathBuf, PricecastError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.output.dir.join(&self.output.forecast_file));
        ensure_parent(&path)?;
        let mut wtr = csv::Writer::from_path(&path).map_err(csv_error)?;
        if forecasts.is_empty() {
            wtr.write_record(["Date", "Predicted_Price"]).map_err(csv_error)?;
        }
        for f in forecasts {
            wtr.serialize(ForecastRecord {
                date: f.date.format("%Y-%m-%d").to_string(),
                predicted_price: f.value,
            })
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        info!(path = %path.display(), days = forecasts.len(), "wrote forecast");
        Ok(path)
    }

    fn append_registry(&self, entry: &RegistryEntry) -> Result<PathBuf, PricecastError> {
        let path = self.output.results_dir().join(&self.output.registry_file);
        ensure_parent(&path)?;
        let is_new = !path.exists() || fs::metadata(&path)?.len() == 0;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        wtr.serialize(entry).map_err(csv_error)?;
        wtr.flush()?;
        Ok(path)
    }

    fn write_pruning_report(
        &self,
        kind: ModelKind,
        date: NaiveDate,
        report: &PruningReport,
    ) -> Result<Vec<PathBuf>, PricecastError> {
        let paths: Vec<PathBuf> = PRUNING_ARTIFACTS
            .iter()
            .map(|stem| self.output.results_dir().join(pruning_file_name(stem, kind, date)))
            .collect();

        write_records(
            &paths[0],
            report
                .baseline_importances
                .iter()
                .map(|(feature, importance)| ImportanceRecord {
                    feature,
                    importance: *importance,
                }),
        )?;
        write_records(
            &paths[1],
            report.selected.iter().map(|feature| SelectedRecord { feature }),
        )?;
        let (b, r) = (&report.baseline.metrics, &report.refined.metrics);
        write_records(
            &paths[2],
            [("MAE", b.mae, r.mae), ("RMSE", b.rmse, r.rmse), ("R2", b.r2, r.r2)]
                .into_iter()
                .map(|(metric, baseline, refined)| ComparisonRecord {
                    metric,
                    baseline,
                    refined,
                }),
        )?;
        write_records(
            &paths[3],
            report
                .baseline
                .predictions
                .iter()
                .zip(&report.refined.predictions)
                .map(|(base, refined)| PredictionComparisonRecord {
                    date: base.date.format("%Y-%m-%d").to_string(),
                    actual: base.actual,
                    predicted_baseline: base.predicted,
                    predicted_refined: refined.predicted,
                }),
        )?;
        info!(
            model = %kind,
            selected = report.selected.len(),
            dir = %self.output.results_dir().display(),
            "wrote pruning report"
        );
        Ok(paths)
    }
}
