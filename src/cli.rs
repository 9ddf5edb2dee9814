//! CLI definition and dispatch.

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvSourceAdapter;
use crate::adapters::csv_artifact_adapter::CsvArtifactAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_model_store::JsonModelStore;
use crate::domain::cleaning::parse_date;
use crate::domain::config_validation::{build_pipeline_config, parse_model_kinds, validate_config};
use crate::domain::error::PricecastError;
use crate::domain::forecast::{Forecast, ForecastRequest, forecast_range};
use crate::domain::frame::MergedFrame;
use crate::domain::model::{ModelKind, TrainedModel};
use crate::domain::pipeline::{
    PipelineConfig, SourceReport, SourceStatus, TrainingOutcome, build_dataset,
    build_merged_frame, train_model,
};
use crate::domain::registry::{RegistryEntry, model_file_name, predictions_file_name};
use crate::ports::artifact_port::ArtifactPort;
use crate::ports::model_port::ModelStore;
use crate::ports::source_port::SourcePort;

const TOP_IMPORTANCES: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "pricecast", about = "Daily commodity price forecasting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalize and merge all sources into the merged dataset
    Merge {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Train, evaluate and save models
    Train {
        #[arg(short, long)]
        config: PathBuf,
        /// random_forest, gradient_boost or all
        #[arg(short, long)]
        model: Option<String>,
        /// Grid-search hyperparameters with time-series cross-validation
        #[arg(long)]
        tune: bool,
        /// Recursively eliminate features until this many remain
        #[arg(long)]
        prune: Option<usize>,
    },
    /// Forecast future prices with a saved model
    Forecast {
        #[arg(short, long)]
        config: PathBuf,
        /// Use the newest saved model of this kind
        #[arg(short, long)]
        model: Option<String>,
        #[arg(long)]
        model_path: Option<PathBuf>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        keep_lead_in: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge, train and forecast in one pass
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(long)]
        tune: bool,
        #[arg(long)]
        prune: Option<usize>,
        #[arg(long)]
        days: Option<u32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show availability and date ranges of each source
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Overrides for a single forecast run.
#[derive(Debug, Default, Clone)]
pub struct ForecastOverrides {
    pub start: Option<String>,
    pub end: Option<String>,
    pub days: Option<u32>,
    pub keep_lead_in: bool,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Merge { config } => run_merge(&config),
        Command::Train {
            config,
            model,
            tune,
            prune,
        } => run_train(&config, model.as_deref(), tune, prune),
        Command::Forecast {
            config,
            model,
            model_path,
            start,
            end,
            days,
            keep_lead_in,
            output,
        } => run_forecast(
            &config,
            model.as_deref(),
            model_path.as_deref(),
            ForecastOverrides {
                start,
                end,
                days,
                keep_lead_in,
            },
            output.as_deref(),
        ),
        Command::Run {
            config,
            model,
            tune,
            prune,
            days,
            output,
        } => run_all(&config, model.as_deref(), tune, prune, days, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Load, validate and convert the configuration file.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    build_pipeline_config(&adapter).map_err(|e| fail(&e))
}

fn fail(e: &PricecastError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

fn resolve_kinds(
    config: &PipelineConfig,
    model_override: Option<&str>,
) -> Result<Vec<ModelKind>, PricecastError> {
    match model_override {
        Some(value) => parse_model_kinds(value).map_err(|reason| PricecastError::ConfigInvalid {
            section: "model".into(),
            key: "kind".into(),
            reason,
        }),
        None => Ok(config.training.kinds.clone()),
    }
}

/// Apply command-line overrides on top of the configured request.
pub fn forecast_request(
    config: &PipelineConfig,
    overrides: &ForecastOverrides,
) -> Result<ForecastRequest, PricecastError> {
    let mut request = config.forecast.clone();
    let parse = |key: &str, raw: &str| {
        parse_date(raw).ok_or_else(|| PricecastError::ConfigInvalid {
            section: "forecast".into(),
            key: key.into(),
            reason: format!("'{raw}' is not a date"),
        })
    };
    if let Some(raw) = &overrides.start {
        request.start = Some(parse("start", raw)?);
    }
    if let Some(raw) = &overrides.end {
        request.end = Some(parse("end", raw)?);
    }
    if let Some(days) = overrides.days {
        request.horizon_days = days;
        if overrides.end.is_none() {
            request.end = None;
        }
    }
    request.keep_lead_in |= overrides.keep_lead_in;
    Ok(request)
}

/// Merge all sources and write the merged dataset.
pub fn merge_stage(
    config: &PipelineConfig,
    sources: &dyn SourcePort,
    artifacts: &dyn ArtifactPort,
) -> Result<(MergedFrame, Vec<SourceReport>), PricecastError> {
    let (frame, reports) = build_merged_frame(sources, config)?;
    let path = artifacts.write_merged(&frame, &config.features.calendar)?;
    eprintln!(
        "Merged {} days ({} columns) into {}",
        frame.len(),
        frame.columns.len() + 1,
        path.display()
    );
    Ok((frame, reports))
}

/// A trained model and where its artifacts went.
#[derive(Debug)]
pub struct SavedModel {
    pub outcome: TrainingOutcome,
    pub model_path: PathBuf,
    pub predictions_path: PathBuf,
    /// Empty unless the model was pruned.
    pub pruning_paths: Vec<PathBuf>,
}

/// Train every requested kind on `frame`, saving models, hold-out
/// predictions, pruning reports and registry rows.
pub fn train_stage(
    config: &PipelineConfig,
    frame: &MergedFrame,
    kinds: &[ModelKind],
    tune: bool,
    trained_at: NaiveDateTime,
    artifacts: &dyn ArtifactPort,
    store: &dyn ModelStore,
) -> Result<Vec<SavedModel>, PricecastError> {
    let (_, dataset) = build_dataset(frame, &config.features)?;
    eprintln!(
        "Training on {} rows x {} features",
        dataset.n_samples(),
        dataset.n_features()
    );

    let date = trained_at.date();
    let mut saved = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let outcome = train_model(&dataset, kind, &config.training, tune)?;
        let model_path = store.save(&outcome.model, &model_file_name(kind, date))?;
        let predictions_path = artifacts.write_predictions(
            &predictions_file_name(kind, date),
            &outcome.evaluation.predictions,
        )?;
        artifacts.append_registry(&RegistryEntry::new(
            trained_at,
            kind,
            &outcome.evaluation.metrics,
            &model_path.display().to_string(),
            &predictions_path.display().to_string(),
        ))?;
        let pruning_paths = match &outcome.pruning {
            Some(report) => artifacts.write_pruning_report(kind, date, report)?,
            None => Vec::new(),
        };
        print_training_summary(&outcome);
        saved.push(SavedModel {
            outcome,
            model_path,
            predictions_path,
            pruning_paths,
        });
    }
    Ok(saved)
}

/// Forecast with `model` and write the forecast file.
pub fn forecast_stage(
    config: &PipelineConfig,
    model: &TrainedModel,
    frame: &MergedFrame,
    request: &ForecastRequest,
    artifacts: &dyn ArtifactPort,
    output: Option<&Path>,
) -> Result<(Vec<Forecast>, PathBuf), PricecastError> {
    let run = forecast_range(model, frame, &config.features, request)?;
    if run.filled_cells > 0 {
        eprintln!(
            "warning: {} feature cells had no value and were filled with 0",
            run.filled_cells
        );
    }
    let path = artifacts.write_forecast(&run.forecasts, output)?;
    Ok((run.forecasts, path))
}

fn print_training_summary(outcome: &TrainingOutcome) {
    let m = &outcome.evaluation.metrics;
    println!();
    println!("== {} ==", outcome.kind);
    if let Some(tuning) = &outcome.tuning {
        println!(
            "  tuned over {} candidates, best CV MAE {:.3}",
            tuning.candidates, tuning.score
        );
    }
    println!(
        "  train rows: {}  test rows: {}",
        outcome.evaluation.train_rows,
        outcome.evaluation.predictions.len()
    );
    println!("  MAE:  {:.3}", m.mae);
    println!("  RMSE: {:.3}", m.rmse);
    println!("  R2:   {:.3}", m.r2);
    if let Some(pruning) = &outcome.pruning {
        let (b, r) = (&pruning.baseline.metrics, &pruning.refined.metrics);
        println!(
            "  pruned {} -> {} features",
            pruning.baseline_importances.len(),
            pruning.selected.len()
        );
        println!("  {:<6} {:>10} {:>10}", "", "baseline", "refined");
        println!("  {:<6} {:>10.3} {:>10.3}", "MAE", b.mae, r.mae);
        println!("  {:<6} {:>10.3} {:>10.3}", "RMSE", b.rmse, r.rmse);
        println!("  {:<6} {:>10.3} {:>10.3}", "R2", b.r2, r.r2);
        println!("  MAE improvement: {:.2}%", pruning.mae_improvement_pct());
    }
    println!("  top features:");
    for (name, importance) in outcome.model.importance_ranking().iter().take(TOP_IMPORTANCES) {
        println!("    {name:<32} {importance:.4}");
    }
}

fn print_forecast(forecasts: &[Forecast], path: &Path) {
    if forecasts.is_empty() {
        println!("0 forecasts: the requested range has no days after the history");
        eprintln!("Empty forecast written to {}", path.display());
        return;
    }
    println!();
    println!("{:<12} {:>12}", "Date", "Predicted");
    for f in forecasts {
        println!("{:<12} {:>12.2}", f.date.format("%Y-%m-%d"), f.value);
    }
    eprintln!("Forecast written to {}", path.display());
}

fn run_merge(config_path: &Path) -> ExitCode {
    let config = match load_pipeline_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let sources = CsvSourceAdapter::new(config.data.clone());
    let artifacts = CsvArtifactAdapter::new(config.output.clone());
    match merge_stage(&config, &sources, &artifacts) {
        Ok((_, reports)) => {
            print_reports(&reports);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_train(config_path: &Path, model: Option<&str>, tune: bool, prune: Option<usize>) -> ExitCode {
    let mut config = match load_pipeline_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if prune.is_some() {
        config.training.prune_to = prune;
    }
    let kinds = match resolve_kinds(&config, model) {
        Ok(k) => k,
        Err(e) => return fail(&e),
    };
    let sources = CsvSourceAdapter::new(config.data.clone());
    let artifacts = CsvArtifactAdapter::new(config.output.clone());
    let store = JsonModelStore::new(config.output.models_dir());

    let result = build_merged_frame(&sources, &config).and_then(|(frame, _)| {
        train_stage(
            &config,
            &frame,
            &kinds,
            tune,
            Local::now().naive_local(),
            &artifacts,
            &store,
        )
    });
    match result {
        Ok(saved) => {
            for s in &saved {
                eprintln!("Saved {} to {}", s.outcome.kind, s.model_path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_forecast(
    config_path: &Path,
    model: Option<&str>,
    model_path: Option<&Path>,
    overrides: ForecastOverrides,
    output: Option<&Path>,
) -> ExitCode {
    let config = match load_pipeline_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let request = match forecast_request(&config, &overrides) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let store = JsonModelStore::new(config.output.models_dir());

    let path = match model_path {
        Some(p) => p.to_path_buf(),
        None => {
            let kind = match resolve_kinds(&config, model) {
                Ok(kinds) => kinds.first().copied().unwrap_or(ModelKind::RandomForest),
                Err(e) => return fail(&e),
            };
            match store.latest(kind) {
                Ok(Some(p)) => p,
                Ok(None) => {
                    return fail(&PricecastError::ModelStore {
                        reason: format!(
                            "no saved {kind} model in {}; run train first",
                            store.dir().display()
                        ),
                    });
                }
                Err(e) => return fail(&e),
            }
        }
    };
    eprintln!("Loading model from {}", path.display());

    let sources = CsvSourceAdapter::new(config.data.clone());
    let artifacts = CsvArtifactAdapter::new(config.output.clone());
    let result = store.load(&path).and_then(|model| {
        let (frame, _) = build_merged_frame(&sources, &config)?;
        forecast_stage(&config, &model, &frame, &request, &artifacts, output)
    });
    match result {
        Ok((forecasts, path)) => {
            print_forecast(&forecasts, &path);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_all(
    config_path: &Path,
    model: Option<&str>,
    tune: bool,
    prune: Option<usize>,
    days: Option<u32>,
    output: Option<&Path>,
) -> ExitCode {
    let mut config = match load_pipeline_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if prune.is_some() {
        config.training.prune_to = prune;
    }
    let kinds = match resolve_kinds(&config, model) {
        Ok(k) => k,
        Err(e) => return fail(&e),
    };
    let overrides = ForecastOverrides {
        days,
        ..ForecastOverrides::default()
    };
    let request = match forecast_request(&config, &overrides) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let sources = CsvSourceAdapter::new(config.data.clone());
    let artifacts = CsvArtifactAdapter::new(config.output.clone());
    let store = JsonModelStore::new(config.output.models_dir());

    let result = merge_stage(&config, &sources, &artifacts).and_then(|(frame, reports)| {
        print_reports(&reports);
        let saved = train_stage(
            &config,
            &frame,
            &kinds,
            tune,
            Local::now().naive_local(),
            &artifacts,
            &store,
        )?;
        let Some(first) = saved.first() else {
            return Ok(None);
        };
        eprintln!("Forecasting with {}", first.outcome.kind);
        forecast_stage(&config, &first.outcome.model, &frame, &request, &artifacts, output)
            .map(Some)
    });
    match result {
        Ok(Some((forecasts, path))) => {
            print_forecast(&forecasts, &path);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match validate_config(&adapter) {
        Ok(()) => {
            eprintln!("Config OK: {}", config_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_info(config_path: &Path) -> ExitCode {
    let config = match load_pipeline_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let sources = CsvSourceAdapter::new(config.data.clone());
    match build_merged_frame(&sources, &config) {
        Ok((frame, reports)) => {
            print_reports(&reports);
            println!();
            match (frame.first_date(), frame.last_date()) {
                (Some(first), Some(last)) => {
                    println!("Merged: {} days, {} to {}", frame.len(), first, last)
                }
                _ => println!("Merged: no rows"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_reports(reports: &[SourceReport]) {
    println!(
        "{:<10} {:<8} {:>8} {:>8} {:>8}  {:<10}  {:<10}",
        "Source", "Status", "Rows", "Days", "Dropped", "First", "Last"
    );
    for r in reports {
        let status = match &r.status {
            SourceStatus::Loaded => "loaded",
            SourceStatus::Missing => "missing",
            SourceStatus::Failed(_) => "failed",
        };
        let date = |d: Option<chrono::NaiveDate>| d.map_or("-".to_string(), |d| d.to_string());
        println!(
            "{:<10} {:<8} {:>8} {:>8} {:>8}  {:<10}  {:<10}",
            r.kind.name(),
            status,
            r.raw_rows,
            r.days,
            r.dropped_rows,
            date(r.first),
            date(r.last)
        );
        if let SourceStatus::Failed(reason) = &r.status {
            println!("    {reason}");
        }
    }
}
