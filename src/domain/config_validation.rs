//! Configuration validation and conversion into a [`PipelineConfig`].
//!
//! Every key is optional and falls back to the built-in default, but a key
//! that is present must parse and be in range. Nothing runs until the whole
//! file has been checked.

use crate::domain::calendar::{CalendarConfig, FestivalWindow};
use crate::domain::cleaning::{CommodityAliases, parse_date};
use crate::domain::error::PricecastError;
use crate::domain::features::{DEFAULT_LAGS, DEFAULT_WINDOWS, FeatureConfig, TemporalSpec};
use crate::domain::model::ModelKind;
use crate::domain::normalizer::SourceKind;
use crate::domain::pipeline::PipelineConfig;
use crate::domain::tuning::UNLIMITED_DEPTH;
use crate::ports::config_port::ConfigPort;
use chrono::Weekday;
use std::path::PathBuf;
use std::str::FromStr;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), PricecastError> {
    build_pipeline_config(config).map(|_| ())
}

pub fn build_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, PricecastError> {
    let mut out = PipelineConfig::default();
    apply_data(config, &mut out)?;
    apply_commodity(config, &mut out)?;
    out.features = build_features(config)?;
    apply_model(config, &mut out)?;
    apply_forecast(config, &mut out)?;
    apply_output(config, &mut out);
    Ok(out)
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PricecastError {
    PricecastError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<String>, PricecastError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(invalid(section, key, "must not be empty")),
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}

fn parse_value<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PricecastError> {
    match non_empty(config, section, key)? {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| invalid(section, key, format!("'{v}' is not a valid number"))),
    }
}

fn parse_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PricecastError> {
    let value = parse_value(config, section, key, default)?;
    if value == 0 {
        return Err(invalid(section, key, "must be at least 1"));
    }
    Ok(value)
}

fn parse_depth(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PricecastError> {
    match non_empty(config, section, key)? {
        Some(v) if v.eq_ignore_ascii_case("none") => Ok(UNLIMITED_DEPTH),
        _ => parse_positive(config, section, key, default),
    }
}

fn parse_fraction(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
    inclusive_one: bool,
) -> Result<f64, PricecastError> {
    let value: f64 = parse_value(config, section, key, default)?;
    let in_range = value > 0.0 && (value < 1.0 || (inclusive_one && value == 1.0));
    if !in_range {
        let upper = if inclusive_one { "1]" } else { "1)" };
        return Err(invalid(section, key, format!("must be in (0, {upper}")));
    }
    Ok(value)
}

fn parse_list<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<T>>, PricecastError> {
    let Some(items) = config.get_list(section, key) else {
        return Ok(None);
    };
    if items.is_empty() {
        return Err(invalid(section, key, "list must not be empty"));
    }
    items
        .iter()
        .map(|item| {
            item.parse()
                .map_err(|_| invalid(section, key, format!("'{item}' is not valid")))
        })
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

fn parse_day_list(
    config: &dyn ConfigPort,
    key: &str,
    default: &[u32],
) -> Result<Vec<u32>, PricecastError> {
    let values = parse_list::<u32>(config, "features", key)?.unwrap_or_else(|| default.to_vec());
    if values.contains(&0) {
        return Err(invalid("features", key, "lags and windows must be at least 1 day"));
    }
    Ok(values)
}

fn apply_data(config: &dyn ConfigPort, out: &mut PipelineConfig) -> Result<(), PricecastError> {
    if let Some(dir) = non_empty(config, "data", "dir")? {
        out.data.dir = PathBuf::from(dir);
    }
    for kind in SourceKind::ALL {
        let key = format!("{}_file", kind.name());
        if let Some(file) = non_empty(config, "data", &key)? {
            out.data.files.insert(kind, file);
        }
    }
    Ok(())
}

fn apply_commodity(config: &dyn ConfigPort, out: &mut PipelineConfig) -> Result<(), PricecastError> {
    let c = &mut out.commodity;
    if let Some(target) = non_empty(config, "commodity", "target")? {
        c.target = target;
    }
    if let Some(variants) = config.get_list("commodity", "supply_variants") {
        if variants.is_empty() {
            return Err(invalid("commodity", "supply_variants", "list must not be empty"));
        }
        c.supply_variants = variants;
    }
    if let Some(aliases) = non_empty(config, "commodity", "aliases")? {
        c.aliases =
            CommodityAliases::parse(&aliases).map_err(|e| invalid("commodity", "aliases", e))?;
    }
    if let Some(v) = non_empty(config, "commodity", "date_column")? {
        c.price_columns.date = v.clone();
        c.supply_columns.date = v;
    }
    if let Some(v) = non_empty(config, "commodity", "name_column")? {
        c.price_columns.commodity = v.clone();
        c.supply_columns.commodity = v;
    }
    if let Some(v) = non_empty(config, "commodity", "price_column")? {
        c.price_columns.value = v;
    }
    if let Some(v) = non_empty(config, "commodity", "arrival_column")? {
        c.supply_columns.value = v;
    }
    if let Some(v) = non_empty(config, "commodity", "weather_date_column")? {
        c.weather_date_column = v;
    }
    Ok(())
}

fn build_features(config: &dyn ConfigPort) -> Result<FeatureConfig, PricecastError> {
    let defaults = FeatureConfig::default();
    let base: Vec<String> = match config.get_list("features", "base") {
        Some(list) if list.is_empty() => {
            return Err(invalid("features", "base", "list must not be empty"));
        }
        Some(list) => list,
        None => defaults.specs.iter().map(|s| s.feature.clone()).collect(),
    };
    let lags = parse_day_list(config, "lags", &DEFAULT_LAGS)?;
    let windows = parse_day_list(config, "windows", &DEFAULT_WINDOWS)?;

    let mut specs = Vec::with_capacity(base.len());
    for feature in &base {
        let own_lags = parse_day_list(config, &format!("{feature}_lags"), &lags)?;
        let own_windows = parse_day_list(config, &format!("{feature}_windows"), &windows)?;
        specs.push(TemporalSpec::new(feature, &own_lags, &own_windows));
    }

    Ok(FeatureConfig {
        specs,
        calendar: build_calendar(config)?,
    })
}

fn build_calendar(config: &dyn ConfigPort) -> Result<CalendarConfig, PricecastError> {
    let mut calendar = CalendarConfig::default();
    if let Some(day) = non_empty(config, "calendar", "weekend")? {
        calendar.weekend = day
            .parse::<Weekday>()
            .map_err(|_| invalid("calendar", "weekend", format!("'{day}' is not a weekday")))?;
    }
    let month: u32 = parse_value(config, "calendar", "fiscal_start_month", 7)?;
    if !(1..=12).contains(&month) {
        return Err(invalid("calendar", "fiscal_start_month", "must be between 1 and 12"));
    }
    calendar.fiscal_start_month = month;
    if let Some(items) = config.get_list("calendar", "festivals") {
        calendar.festivals = items
            .iter()
            .map(|f| FestivalWindow::parse(f).map_err(|e| invalid("calendar", "festivals", e)))
            .collect::<Result<_, _>>()?;
    }
    Ok(calendar)
}

fn apply_model(config: &dyn ConfigPort, out: &mut PipelineConfig) -> Result<(), PricecastError> {
    let t = &mut out.training;
    if let Some(kind) = non_empty(config, "model", "kind")? {
        t.kinds = parse_model_kinds(&kind).map_err(|e| invalid("model", "kind", e))?;
    }

    let forest = &mut t.model.forest;
    forest.n_trees = parse_positive(config, "model", "n_trees", forest.n_trees)?;
    forest.max_depth = parse_depth(config, "model", "max_depth", forest.max_depth)?;
    forest.min_samples_split =
        parse_value(config, "model", "min_samples_split", forest.min_samples_split)?;
    if forest.min_samples_split < 2 {
        return Err(invalid("model", "min_samples_split", "must be at least 2"));
    }
    forest.min_samples_leaf =
        parse_positive(config, "model", "min_samples_leaf", forest.min_samples_leaf)?;
    if non_empty(config, "model", "max_features")?.is_some() {
        forest.max_features = Some(parse_positive(config, "model", "max_features", 1)?);
    }
    forest.bootstrap = config.get_bool("model", "bootstrap", forest.bootstrap);
    forest.seed = parse_value(config, "model", "seed", forest.seed)?;

    let boost = &mut t.model.boost;
    boost.n_estimators = parse_positive(config, "model", "gb_n_estimators", boost.n_estimators)?;
    boost.max_depth = parse_depth(config, "model", "gb_max_depth", boost.max_depth)?;
    boost.learning_rate =
        parse_fraction(config, "model", "gb_learning_rate", boost.learning_rate, true)?;
    boost.subsample = parse_fraction(config, "model", "gb_subsample", boost.subsample, true)?;
    boost.min_samples_split = t.model.forest.min_samples_split;
    boost.min_samples_leaf = t.model.forest.min_samples_leaf;
    boost.seed = t.model.forest.seed;

    t.test_ratio = parse_fraction(config, "model", "test_ratio", t.test_ratio, false)?;
    t.cv_splits = parse_value(config, "model", "cv_splits", t.cv_splits)?;
    if t.cv_splits < 2 {
        return Err(invalid("model", "cv_splits", "must be at least 2"));
    }
    if non_empty(config, "model", "prune_features")?.is_some() {
        t.prune_to = Some(parse_positive(config, "model", "prune_features", 1)?);
    }

    if let Some(v) = parse_list::<usize>(config, "model", "grid_n_trees")? {
        t.grid.n_trees = v;
    }
    if let Some(items) = config.get_list("model", "grid_max_depth") {
        t.grid.max_depth = items
            .iter()
            .map(|item| {
                if item.eq_ignore_ascii_case("none") {
                    Ok(UNLIMITED_DEPTH)
                } else {
                    item.parse()
                        .map_err(|_| invalid("model", "grid_max_depth", format!("'{item}' is not valid")))
                }
            })
            .collect::<Result<_, _>>()?;
    }
    if let Some(v) = parse_list::<usize>(config, "model", "grid_min_samples_split")? {
        t.grid.min_samples_split = v;
    }
    if let Some(v) = parse_list::<usize>(config, "model", "grid_min_samples_leaf")? {
        t.grid.min_samples_leaf = v;
    }
    Ok(())
}

/// `all` or a single model name.
pub fn parse_model_kinds(value: &str) -> Result<Vec<ModelKind>, String> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(ModelKind::ALL.to_vec());
    }
    value.parse::<ModelKind>().map(|k| vec![k])
}

fn apply_forecast(config: &dyn ConfigPort, out: &mut PipelineConfig) -> Result<(), PricecastError> {
    out.forecast.horizon_days =
        parse_value(config, "forecast", "horizon_days", out.forecast.horizon_days)?;
    for key in ["start", "end"] {
        if let Some(raw) = non_empty(config, "forecast", key)? {
            let date = parse_date(&raw)
                .ok_or_else(|| invalid("forecast", key, format!("'{raw}' is not a date")))?;
            if key == "start" {
                out.forecast.start = Some(date);
            } else {
                out.forecast.end = Some(date);
            }
        }
    }
    out.forecast.keep_lead_in = config.get_bool("forecast", "keep_lead_in", false);
    Ok(())
}

fn apply_output(config: &dyn ConfigPort, out: &mut PipelineConfig) {
    let o = &mut out.output;
    if let Some(dir) = config.get_string("output", "dir").filter(|d| !d.trim().is_empty()) {
        o.dir = PathBuf::from(dir.trim());
    }
    for (key, slot) in [
        ("merged_file", &mut o.merged_file),
        ("forecast_file", &mut o.forecast_file),
        ("registry_file", &mut o.registry_file),
    ] {
        if let Some(v) = config.get_string("output", key).filter(|v| !v.trim().is_empty()) {
            *slot = v.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new(pairs: &[(&str, &str, &str)]) -> Self {
            Self {
                values: pairs
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            }
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .map(|v| v == "true")
                .unwrap_or(default)
        }
    }

    fn expect_invalid(pairs: &[(&str, &str, &str)], key: &str) {
        match validate_config(&MockConfig::new(pairs)) {
            Err(PricecastError::ConfigInvalid { key: k, .. }) => assert_eq!(k, key),
            other => panic!("expected invalid {key}, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_yields_defaults() {
        let config = build_pipeline_config(&MockConfig::new(&[])).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = build_pipeline_config(&MockConfig::new(&[
            ("data", "dir", "/srv/data"),
            ("data", "fuel_file", "diesel.csv"),
            ("commodity", "target", "Tomato_Small"),
            ("features", "base", "Average_Price, Kavre_Rainfall_MM"),
            ("features", "Kavre_Rainfall_MM_lags", "1,3,7,14"),
            ("features", "Kavre_Rainfall_MM_windows", "7,14,30"),
            ("calendar", "weekend", "sunday"),
            ("model", "kind", "all"),
            ("model", "max_depth", "none"),
            ("forecast", "horizon_days", "14"),
            ("model", "prune_features", "20"),
        ]))
        .unwrap();
        assert_eq!(
            config.data.path(SourceKind::Fuel),
            PathBuf::from("/srv/data/diesel.csv")
        );
        assert_eq!(config.commodity.target, "Tomato_Small");
        assert_eq!(config.features.specs.len(), 2);
        assert_eq!(config.features.specs[0].lags, vec![1, 3, 7]);
        assert_eq!(config.features.specs[1].lags, vec![1, 3, 7, 14]);
        assert_eq!(config.features.specs[1].windows, vec![7, 14, 30]);
        assert_eq!(config.features.calendar.weekend, Weekday::Sun);
        assert_eq!(config.training.kinds, ModelKind::ALL.to_vec());
        assert_eq!(config.training.model.forest.max_depth, UNLIMITED_DEPTH);
        assert_eq!(config.forecast.horizon_days, 14);
        assert_eq!(config.training.prune_to, Some(20));
    }

    #[test]
    fn rejects_out_of_range_values() {
        expect_invalid(&[("model", "test_ratio", "1.0")], "test_ratio");
        expect_invalid(&[("model", "test_ratio", "0")], "test_ratio");
        expect_invalid(&[("model", "n_trees", "0")], "n_trees");
        expect_invalid(&[("model", "n_trees", "many")], "n_trees");
        expect_invalid(&[("model", "min_samples_split", "1")], "min_samples_split");
        expect_invalid(&[("model", "gb_learning_rate", "1.5")], "gb_learning_rate");
        expect_invalid(&[("model", "cv_splits", "1")], "cv_splits");
        expect_invalid(&[("model", "kind", "svm")], "kind");
        expect_invalid(&[("model", "prune_features", "0")], "prune_features");
        expect_invalid(&[("forecast", "horizon_days", "-1")], "horizon_days");
        expect_invalid(&[("calendar", "fiscal_start_month", "13")], "fiscal_start_month");
    }

    #[test]
    fn rejects_malformed_lists() {
        expect_invalid(&[("features", "lags", "1,0,7")], "lags");
        expect_invalid(&[("features", "windows", "7,abc")], "windows");
        expect_invalid(&[("features", "base", " , ")], "base");
        expect_invalid(&[("calendar", "festivals", "Holi:03-01")], "festivals");
        expect_invalid(&[("commodity", "aliases", "Tomato")], "aliases");
    }

    #[test]
    fn empty_forecast_ranges_are_accepted() {
        let config = build_pipeline_config(&MockConfig::new(&[
            ("forecast", "start", "2024-02-01"),
            ("forecast", "end", "2024-01-01"),
            ("forecast", "horizon_days", "0"),
        ]))
        .unwrap();
        assert_eq!(config.forecast.horizon_days, 0);
        assert!(config.forecast.start > config.forecast.end);
    }

    #[test]
    fn unparseable_forecast_date_is_invalid() {
        expect_invalid(&[("forecast", "start", "someday")], "start");
    }

    #[test]
    fn model_kinds_accept_all() {
        assert_eq!(parse_model_kinds("ALL").unwrap().len(), 2);
        assert_eq!(
            parse_model_kinds("gradient_boost").unwrap(),
            vec![ModelKind::GradientBoost]
        );
    }
}
