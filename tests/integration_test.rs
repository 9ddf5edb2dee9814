//! Integration tests across the source, feature, model and forecast stages.
//!
//! Tests cover:
//! - Source loading and merging through a mock source port
//! - Feature engineering: lags, rolling windows, festival flags
//! - Training, evaluation and recursive forecasting on a short series
//! - Model persistence through the JSON store
//! - Properties: no lookahead in temporal features, chronological splits

mod common;

use approx::assert_relative_eq;
use common::*;
use pricecast::adapters::json_model_store::JsonModelStore;
use pricecast::domain::dataset::Dataset;
use pricecast::domain::error::PricecastError;
use pricecast::domain::features::{FeatureConfig, build_features, lag_value, rolling_mean};
use pricecast::domain::forecast::{ForecastRequest, forecast_range};
use pricecast::domain::frame::{FrameRow, MergedFrame};
use pricecast::domain::model::ModelKind;
use pricecast::domain::normalizer::{
    FUEL_COLUMN, PRICE_COLUMN, SUPPLY_COLUMN, SourceKind,
};
use pricecast::domain::pipeline::{SourceStatus, build_dataset, build_merged_frame, train_model};
use pricecast::ports::model_port::{ModelStore, Regressor};
use proptest::prelude::*;

fn forty_day_port() -> MockSourcePort {
    let start = date(2024, 1, 1);
    MockSourcePort::new().with_table(SourceKind::Price, price_table(start, &seasonal_prices(40)))
}

mod source_loading {
    use super::*;

    #[test]
    fn price_only_history_merges_every_day() {
        let (frame, reports) = build_merged_frame(&forty_day_port(), &fast_config()).unwrap();
        assert_eq!(frame.len(), 40);
        assert_eq!(frame.first_date(), Some(date(2024, 1, 1)));
        assert_eq!(frame.last_date(), Some(date(2024, 2, 9)));
        let price = reports.iter().find(|r| r.kind == SourceKind::Price).unwrap();
        assert_eq!(price.status, SourceStatus::Loaded);
        assert_eq!(price.days, 40);
        assert!(
            reports
                .iter()
                .filter(|r| r.kind != SourceKind::Price)
                .all(|r| r.status == SourceStatus::Missing)
        );
    }

    #[test]
    fn supply_variants_are_summed_onto_price_date() {
        let start = date(2024, 1, 1);
        let port = forty_day_port().with_table(
            SourceKind::Supply,
            supply_table(&[
                (day(start, 4), BIG_TOMATO, 1200.0),
                (day(start, 4), SMALL_TOMATO, 300.0),
                (day(start, 4), "आलु रातो", 9000.0),
                (day(start, 5), SMALL_TOMATO, 800.0),
            ]),
        );
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();
        assert_relative_eq!(frame.value(day(start, 4), SUPPLY_COLUMN).unwrap(), 1500.0);
        assert_relative_eq!(frame.value(day(start, 5), SUPPLY_COLUMN).unwrap(), 800.0);
        assert_eq!(frame.value(day(start, 6), SUPPLY_COLUMN), None);
    }

    #[test]
    fn sparse_fuel_prices_are_forward_filled() {
        let start = date(2024, 1, 1);
        let port = forty_day_port().with_table(
            SourceKind::Fuel,
            series_table("Diesel", &[(day(start, 2), 150.0), (day(start, 20), 160.0)]),
        );
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();
        assert_eq!(frame.value(day(start, 1), FUEL_COLUMN), None);
        assert_relative_eq!(frame.value(day(start, 2), FUEL_COLUMN).unwrap(), 150.0);
        assert_relative_eq!(frame.value(day(start, 19), FUEL_COLUMN).unwrap(), 150.0);
        assert_relative_eq!(frame.value(day(start, 39), FUEL_COLUMN).unwrap(), 160.0);
    }

    #[test]
    fn weather_rain_gaps_become_zero() {
        let start = date(2024, 1, 1);
        let port = forty_day_port().with_table(SourceKind::Weather, weather_table(start, 40));
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();
        assert_relative_eq!(frame.value(start, "Kavre_Rainfall_MM").unwrap(), 0.0);
        assert!(frame.value(day(start, 3), "Kathmandu_Temp_C").is_some());
    }

    #[test]
    fn failing_optional_source_does_not_stop_the_run() {
        let port = forty_day_port().with_error(SourceKind::Exchange, "truncated file");
        let (frame, reports) = build_merged_frame(&port, &fast_config()).unwrap();
        assert_eq!(frame.len(), 40);
        let exchange = reports
            .iter()
            .find(|r| r.kind == SourceKind::Exchange)
            .unwrap();
        assert!(matches!(exchange.status, SourceStatus::Failed(_)));
    }

    #[test]
    fn missing_price_source_is_fatal() {
        let err = build_merged_frame(&MockSourcePort::new(), &fast_config()).unwrap_err();
        assert!(matches!(err, PricecastError::SourceUnavailable { .. }));
    }

    #[test]
    fn price_schema_mismatch_is_fatal() {
        let port = MockSourcePort::new().with_table(
            SourceKind::Price,
            table(&["Date", "Item", "Price"], vec![vec!["2024-01-01".into(), "x".into(), "1".into()]]),
        );
        let err = build_merged_frame(&port, &fast_config()).unwrap_err();
        assert!(matches!(err, PricecastError::SchemaMismatch { .. }));
    }
}

mod feature_engineering {
    use super::*;

    #[test]
    fn forty_rows_leave_ten_trainable() {
        let config = fast_config();
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (features, dataset) = build_dataset(&frame, &config.features).unwrap();
        assert_eq!(features.rows.len(), 40);
        assert_eq!(dataset.n_samples(), 10);
        assert_eq!(dataset.dates[0], date(2024, 1, 31));
    }

    #[test]
    fn rolling_mean_never_sees_the_same_day() {
        let start = date(2024, 1, 1);
        let mut prices = vec![10.0; 40];
        prices[35] = 1000.0;
        let port = MockSourcePort::new().with_table(SourceKind::Price, price_table(start, &prices));
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();

        assert_relative_eq!(rolling_mean(&frame, PRICE_COLUMN, day(start, 35), 7).unwrap(), 10.0);
        assert_relative_eq!(
            rolling_mean(&frame, PRICE_COLUMN, day(start, 36), 7).unwrap(),
            (6.0 * 10.0 + 1000.0) / 7.0
        );
        assert_relative_eq!(lag_value(&frame, PRICE_COLUMN, day(start, 36), 1).unwrap(), 1000.0);
    }

    #[test]
    fn lag_is_undefined_across_a_gap() {
        let start = date(2024, 1, 1);
        let mut prices = price_table(start, &seasonal_prices(20));
        // Drop day 10 entirely.
        prices.rows.retain(|r| r[0] != day(start, 10).format("%Y-%m-%d").to_string());
        let port = MockSourcePort::new().with_table(SourceKind::Price, prices);
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();
        assert_eq!(lag_value(&frame, PRICE_COLUMN, day(start, 11), 1), None);
        assert!(lag_value(&frame, PRICE_COLUMN, day(start, 12), 1).is_some());
        assert_eq!(rolling_mean(&frame, PRICE_COLUMN, day(start, 12), 7), None);
    }

    #[test]
    fn festival_flag_inside_and_outside_windows() {
        let start = date(2024, 9, 20);
        let port = MockSourcePort::new().with_table(SourceKind::Price, price_table(start, &[50.0; 40]));
        let (frame, _) = build_merged_frame(&port, &fast_config()).unwrap();
        let features = build_features(&frame, &FeatureConfig::default());
        let idx = features
            .layout
            .names
            .iter()
            .position(|n| n == "is_festival")
            .unwrap();
        let flag = |d| {
            features
                .rows
                .iter()
                .find(|r| r.date == d)
                .and_then(|r| r.values[idx])
                .unwrap()
        };
        assert_eq!(flag(date(2024, 9, 24)), 0.0);
        assert_eq!(flag(date(2024, 10, 1)), 1.0);
        assert_eq!(flag(date(2024, 10, 16)), 0.0);
        assert_eq!(flag(date(2024, 10, 28)), 0.0);
    }
}

mod training_and_forecasting {
    use super::*;

    #[test]
    fn forty_day_series_yields_seven_forecasts() {
        let config = fast_config();
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (_, dataset) = build_dataset(&frame, &config.features).unwrap();
        let outcome = train_model(&dataset, ModelKind::RandomForest, &config.training, false).unwrap();
        assert_eq!(outcome.evaluation.train_rows, 8);
        assert_eq!(outcome.evaluation.predictions.len(), 2);
        assert!(outcome.evaluation.metrics.mae.is_finite());

        let run = forecast_range(&outcome.model, &frame, &config.features, &ForecastRequest::default())
            .unwrap();
        assert_eq!(run.forecasts.len(), 7);
        assert_eq!(run.forecasts[0].date, date(2024, 2, 10));
        assert!(run.forecasts.windows(2).all(|w| w[0].date < w[1].date));
        assert!(run.forecasts.iter().all(|f| f.value.is_finite()));
        assert_eq!(frame.len(), 40);
    }

    #[test]
    fn gradient_boosting_with_tuning_forecasts() {
        let config = fast_config();
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (_, dataset) = build_dataset(&frame, &config.features).unwrap();
        let outcome = train_model(&dataset, ModelKind::GradientBoost, &config.training, true).unwrap();
        assert!(outcome.tuning.is_some());
        let run = forecast_range(&outcome.model, &frame, &config.features, &ForecastRequest::days(3))
            .unwrap();
        assert_eq!(run.forecasts.len(), 3);
    }

    #[test]
    fn pruned_model_keeps_requested_features_and_forecasts() {
        let mut config = fast_config();
        config.training.prune_to = Some(5);
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (_, dataset) = build_dataset(&frame, &config.features).unwrap();
        assert!(dataset.n_features() > 5);
        let outcome = train_model(&dataset, ModelKind::RandomForest, &config.training, false).unwrap();

        let pruning = outcome.pruning.as_ref().unwrap();
        assert_eq!(pruning.selected.len(), 5);
        assert_eq!(pruning.baseline_importances.len(), dataset.n_features());
        assert_eq!(outcome.model.feature_names(), pruning.selected.as_slice());
        assert_eq!(outcome.evaluation, pruning.refined);

        let run = forecast_range(&outcome.model, &frame, &config.features, &ForecastRequest::days(4))
            .unwrap();
        assert_eq!(run.forecasts.len(), 4);
        assert_eq!(run.filled_cells, 0);
        assert!(run.forecasts.iter().all(|f| f.value.is_finite()));
    }

    #[test]
    fn inverted_range_forecasts_nothing() {
        let config = fast_config();
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (_, dataset) = build_dataset(&frame, &config.features).unwrap();
        let outcome = train_model(&dataset, ModelKind::RandomForest, &config.training, false).unwrap();
        let request = ForecastRequest {
            start: Some(date(2024, 2, 20)),
            end: Some(date(2024, 2, 12)),
            ..ForecastRequest::default()
        };
        let run = forecast_range(&outcome.model, &frame, &config.features, &request).unwrap();
        assert!(run.forecasts.is_empty());
        let zero_days = forecast_range(&outcome.model, &frame, &config.features, &ForecastRequest::days(0))
            .unwrap();
        assert!(zero_days.forecasts.is_empty());
    }

    #[test]
    fn too_short_history_is_insufficient() {
        let port = MockSourcePort::new()
            .with_table(SourceKind::Price, price_table(date(2024, 1, 1), &seasonal_prices(20)));
        let config = fast_config();
        let (frame, _) = build_merged_frame(&port, &config).unwrap();
        let err = build_dataset(&frame, &config.features).unwrap_err();
        assert!(matches!(err, PricecastError::InsufficientHistory { need: 31, .. }));
    }

    #[test]
    fn saved_model_forecasts_like_the_original() {
        let config = fast_config();
        let (frame, _) = build_merged_frame(&forty_day_port(), &config).unwrap();
        let (_, dataset) = build_dataset(&frame, &config.features).unwrap();
        let outcome = train_model(&dataset, ModelKind::RandomForest, &config.training, false).unwrap();

        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonModelStore::new(dir.path());
        let path = store.save(&outcome.model, "random_forest_2024-02-09.json").unwrap();
        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded.feature_names(), outcome.model.feature_names());

        let request = ForecastRequest::default();
        let a = forecast_range(&outcome.model, &frame, &config.features, &request).unwrap();
        let b = forecast_range(&loaded, &frame, &config.features, &request).unwrap();
        assert_eq!(a.forecasts, b.forecasts);
    }
}

fn frame_from(prices: &[f64]) -> MergedFrame {
    let start = date(2024, 1, 1);
    let mut frame = MergedFrame::new(PRICE_COLUMN, Vec::new());
    for (i, p) in prices.iter().enumerate() {
        frame
            .push(FrameRow {
                date: day(start, i),
                target: Some(*p),
                values: Vec::new(),
            })
            .unwrap();
    }
    frame
}

proptest! {
    #[test]
    fn temporal_features_ignore_the_present_and_future(
        prices in prop::collection::vec(1.0f64..500.0, 35..60),
        cut in 0usize..60,
        replacement in 1.0f64..500.0,
    ) {
        let cut = cut % prices.len();
        let config = FeatureConfig::default();
        let original = build_features(&frame_from(&prices), &config);

        let mut altered = prices.clone();
        for p in altered.iter_mut().skip(cut) {
            *p = replacement;
        }
        let changed = build_features(&frame_from(&altered), &config);

        prop_assert_eq!(&original.rows[cut].values, &changed.rows[cut].values);
    }

    #[test]
    fn chronological_split_keeps_time_order(n in 2usize..200, ratio in 0.05f64..0.5) {
        let mut data = Dataset::new(vec!["x".to_string()]);
        for i in 0..n {
            data.push(vec![i as f64], i as f64, day(date(2023, 1, 1), i));
        }
        if let Ok((train, test)) = data.chronological_split(ratio) {
            prop_assert!(!train.is_empty() && !test.is_empty());
            prop_assert_eq!(train.n_samples() + test.n_samples(), n);
            let last_train = train.dates.last().unwrap();
            prop_assert!(test.dates.iter().all(|d| d > last_train));
        }
    }
}
