//! Stage orchestration and the explicit configuration each stage receives.

use crate::domain::cleaning::CommodityAliases;
use crate::domain::dataset::Dataset;
use crate::domain::error::PricecastError;
use crate::domain::evaluation::{Evaluation, evaluate};
use crate::domain::features::{FeatureConfig, FeatureFrame, build_features};
use crate::domain::forecast::ForecastRequest;
use crate::domain::frame::MergedFrame;
use crate::domain::merge::merge_sources;
use crate::domain::model::{ModelConfig, ModelKind, TrainedModel};
use crate::domain::normalizer::forward_fill::ForwardFillNormalizer;
use crate::domain::normalizer::price::PriceNormalizer;
use crate::domain::normalizer::supply::SupplyNormalizer;
use crate::domain::normalizer::weather::WeatherNormalizer;
use crate::domain::normalizer::{
    CommodityColumns, EXCHANGE_COLUMN, FUEL_COLUMN, INFLATION_COLUMN, NormalizedSource,
    SourceKind, SourceNormalizer,
};
use crate::domain::pruning::{PruningReport, prune_features};
use crate::domain::tuning::{ParamGrid, TuningResult, grid_search};
use crate::ports::model_port::Regressor;
use crate::ports::source_port::SourcePort;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub files: HashMap<SourceKind, String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            files: SourceKind::ALL
                .iter()
                .map(|k| (*k, k.default_file_name().to_string()))
                .collect(),
        }
    }
}

impl DataConfig {
    pub fn path(&self, kind: SourceKind) -> PathBuf {
        let name = self
            .files
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_file_name());
        self.dir.join(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommodityConfig {
    pub target: String,
    pub supply_variants: Vec<String>,
    pub aliases: CommodityAliases,
    pub price_columns: CommodityColumns,
    pub supply_columns: CommodityColumns,
    pub weather_date_column: String,
}

impl Default for CommodityConfig {
    fn default() -> Self {
        Self {
            target: "Tomato_Big".to_string(),
            supply_variants: vec![
                "Tomato_Big".to_string(),
                "Tomato_Small".to_string(),
                "Tomato".to_string(),
            ],
            aliases: CommodityAliases::default(),
            price_columns: CommodityColumns {
                date: "Date".to_string(),
                commodity: "कृषि उपज".to_string(),
                value: "औसत".to_string(),
            },
            supply_columns: CommodityColumns {
                date: "Date".to_string(),
                commodity: "कृषि उपज".to_string(),
                value: "आगमन".to_string(),
            },
            weather_date_column: "Date".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub kinds: Vec<ModelKind>,
    pub model: ModelConfig,
    pub test_ratio: f64,
    pub cv_splits: usize,
    pub grid: ParamGrid,
    /// Prune to this many features by recursive elimination before the
    /// final fit.
    pub prune_to: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            kinds: vec![ModelKind::RandomForest],
            model: ModelConfig::default(),
            test_ratio: 0.2,
            cv_splits: 5,
            grid: ParamGrid::default(),
            prune_to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub merged_file: String,
    pub forecast_file: String,
    pub registry_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
            merged_file: "tomato_clean_data.csv".to_string(),
            forecast_file: "forecast.csv".to_string(),
            registry_file: "model_registry.csv".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn models_dir(&self) -> PathBuf {
        self.dir.join("models")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.dir.join("results")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub commodity: CommodityConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastRequest,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Loaded,
    Missing,
    Failed(String),
}

/// What happened to one source during loading.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub kind: SourceKind,
    pub location: String,
    pub status: SourceStatus,
    pub raw_rows: usize,
    pub days: usize,
    pub dropped_rows: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl SourceReport {
    fn new(kind: SourceKind, location: String, status: SourceStatus) -> Self {
        Self {
            kind,
            location,
            status,
            raw_rows: 0,
            days: 0,
            dropped_rows: 0,
            first: None,
            last: None,
        }
    }
}

/// Every normalized source, price first.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub price: NormalizedSource,
    pub others: Vec<(SourceKind, NormalizedSource)>,
    pub reports: Vec<SourceReport>,
}

impl LoadedSources {
    pub fn merge(&self) -> MergedFrame {
        let others: Vec<(SourceKind, &_)> = self
            .others
            .iter()
            .map(|(kind, source)| (*kind, &source.table))
            .collect();
        merge_sources(&self.price.table, &others)
    }
}

fn normalizer_for(
    kind: SourceKind,
    config: &CommodityConfig,
    fill_until: Option<NaiveDate>,
) -> Box<dyn SourceNormalizer> {
    match kind {
        SourceKind::Price => Box::new(PriceNormalizer {
            columns: config.price_columns.clone(),
            aliases: config.aliases.clone(),
            target: config.target.clone(),
        }),
        SourceKind::Supply => Box::new(SupplyNormalizer {
            columns: config.supply_columns.clone(),
            aliases: config.aliases.clone(),
            variants: config.supply_variants.clone(),
        }),
        SourceKind::Weather => Box::new(WeatherNormalizer {
            date_column: config.weather_date_column.clone(),
        }),
        SourceKind::Fuel => {
            Box::new(ForwardFillNormalizer::new(kind, FUEL_COLUMN).fill_until(fill_until))
        }
        SourceKind::Inflation => {
            Box::new(ForwardFillNormalizer::new(kind, INFLATION_COLUMN).fill_until(fill_until))
        }
        SourceKind::Exchange => {
            Box::new(ForwardFillNormalizer::new(kind, EXCHANGE_COLUMN).fill_until(fill_until))
        }
    }
}

fn normalize_one(
    port: &dyn SourcePort,
    kind: SourceKind,
    config: &CommodityConfig,
    fill_until: Option<NaiveDate>,
) -> Result<(NormalizedSource, SourceReport), PricecastError> {
    let location = port.describe(kind);
    let read = match port.read_table(kind) {
        Ok(read) => read,
        Err(e) if !kind.is_required() => {
            error!(source = %kind, error = %e, "optional source unreadable, using empty table");
            return Ok((
                NormalizedSource::empty_for(kind),
                SourceReport::new(kind, location, SourceStatus::Failed(e.to_string())),
            ));
        }
        Err(e) => return Err(e),
    };
    let Some(raw) = read else {
        if kind.is_required() {
            return Err(PricecastError::SourceUnavailable {
                source_name: kind.name().to_string(),
                path: location,
            });
        }
        warn!(source = %kind, path = %location, "optional source unavailable, using empty table");
        return Ok((
            NormalizedSource::empty_for(kind),
            SourceReport::new(kind, location, SourceStatus::Missing),
        ));
    };

    let normalized = match normalizer_for(kind, config, fill_until).normalize(&raw) {
        Ok(n) => n,
        Err(e) if !kind.is_required() => {
            error!(source = %kind, error = %e, "optional source rejected, using empty table");
            let mut report = SourceReport::new(kind, location, SourceStatus::Failed(e.to_string()));
            report.raw_rows = raw.row_count() + raw.skipped_rows;
            report.dropped_rows = raw.skipped_rows;
            return Ok((NormalizedSource::empty_for(kind), report));
        }
        Err(e) => return Err(e),
    };

    let dropped = normalized.dropped_rows + raw.skipped_rows;
    if dropped > 0 {
        warn!(
            source = %kind,
            dropped,
            unreadable = raw.skipped_rows,
            "dropped malformed rows"
        );
    }
    let report = SourceReport {
        kind,
        location,
        status: SourceStatus::Loaded,
        raw_rows: raw.row_count() + raw.skipped_rows,
        days: normalized.table.len(),
        dropped_rows: dropped,
        first: normalized.table.first_date(),
        last: normalized.table.last_date(),
    };
    Ok((normalized, report))
}

/// Read and normalize every source. Price is required and must yield at
/// least one day; the others degrade to empty tables.
pub fn load_sources(
    port: &dyn SourcePort,
    config: &PipelineConfig,
) -> Result<LoadedSources, PricecastError> {
    let (price, price_report) = normalize_one(port, SourceKind::Price, &config.commodity, None)?;
    if price.table.is_empty() {
        return Err(PricecastError::InsufficientHistory {
            stage: format!("price series for {}", config.commodity.target),
            have: 0,
            need: 1,
        });
    }
    let fill_until = price.table.last_date();

    let mut reports = vec![price_report];
    let mut others = Vec::new();
    for kind in SourceKind::ALL.into_iter().filter(|k| *k != SourceKind::Price) {
        let (normalized, report) = normalize_one(port, kind, &config.commodity, fill_until)?;
        reports.push(report);
        others.push((kind, normalized));
    }

    info!(
        price_days = price.table.len(),
        sources = others.len() + 1,
        "loaded sources"
    );
    Ok(LoadedSources {
        price,
        others,
        reports,
    })
}

/// Load, normalize and merge in one step.
pub fn build_merged_frame(
    port: &dyn SourcePort,
    config: &PipelineConfig,
) -> Result<(MergedFrame, Vec<SourceReport>), PricecastError> {
    let sources = load_sources(port, config)?;
    let frame = sources.merge();
    info!(
        rows = frame.len(),
        columns = frame.columns.len(),
        "merged dataset ready"
    );
    Ok((frame, sources.reports))
}

/// Trainable dataset from a merged frame, with a clear error when the
/// lookback leaves nothing to train on.
pub fn build_dataset(
    frame: &MergedFrame,
    features: &FeatureConfig,
) -> Result<(FeatureFrame, Dataset), PricecastError> {
    let feature_frame = build_features(frame, features);
    let dataset = Dataset::from_feature_frame(&feature_frame);
    if dataset.is_empty() {
        return Err(PricecastError::InsufficientHistory {
            stage: "feature engineering".to_string(),
            have: frame.len(),
            need: features.max_lookback() as usize + 1,
        });
    }
    Ok((feature_frame, dataset))
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub kind: ModelKind,
    pub evaluation: Evaluation,
    /// Refitted on every trainable row after evaluation.
    pub model: TrainedModel,
    pub tuning: Option<TuningResult>,
    pub pruning: Option<PruningReport>,
}

/// Optionally tune and prune, evaluate on a chronological hold-out, then
/// refit on the full dataset. A pruned model is evaluated and refitted on
/// the selected features only.
pub fn train_model(
    dataset: &Dataset,
    kind: ModelKind,
    training: &TrainingConfig,
    tune: bool,
) -> Result<TrainingOutcome, PricecastError> {
    let tuning = if tune {
        let (train, _) = dataset.chronological_split(training.test_ratio)?;
        Some(grid_search(
            &train,
            kind,
            &training.model,
            &training.grid,
            training.cv_splits,
        )?)
    } else {
        None
    };
    let config = tuning.as_ref().map_or(training.model, |t| t.config);

    let (evaluation, data, pruning) = match training.prune_to {
        Some(keep) => {
            let report = prune_features(dataset, kind, &config, keep, training.test_ratio)?;
            let pruned = dataset.select_features(&report.selected)?;
            (report.refined.clone(), Cow::Owned(pruned), Some(report))
        }
        None => {
            let mut holdout = TrainedModel::new(kind, &config);
            let evaluation = evaluate(&mut holdout, dataset, training.test_ratio)?;
            (evaluation, Cow::Borrowed(dataset), None)
        }
    };
    info!(
        model = %kind,
        mae = evaluation.metrics.mae,
        rmse = evaluation.metrics.rmse,
        r2 = evaluation.metrics.r2,
        "hold-out evaluation"
    );

    let mut model = TrainedModel::new(kind, &config);
    model.fit(&data)?;
    Ok(TrainingOutcome {
        kind,
        evaluation,
        model,
        tuning,
        pruning,
    })
}
