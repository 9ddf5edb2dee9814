//! Numeric training matrix built from the trainable rows of a feature frame.

use crate::domain::error::PricecastError;
use crate::domain::features::FeatureFrame;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Value used for a covariate cell that is still undefined on a trainable row.
pub const MISSING_FILL: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    /// n_samples x n_features
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub dates: Vec<NaiveDate>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            features: Vec::new(),
            targets: Vec::new(),
            dates: Vec::new(),
        }
    }

    /// Build from the trainable rows of `frame`.
    ///
    /// Feature columns with no defined value on any trainable row are
    /// excluded; remaining gaps are filled with [`MISSING_FILL`].
    pub fn from_feature_frame(frame: &FeatureFrame) -> Self {
        let rows: Vec<_> = frame.trainable_rows().collect();
        let names = &frame.layout.names;

        let keep: Vec<usize> = (0..names.len())
            .filter(|&j| rows.iter().any(|r| r.values[j].is_some()))
            .collect();
        let excluded: Vec<&str> = (0..names.len())
            .filter(|j| !keep.contains(j))
            .map(|j| names[j].as_str())
            .collect();
        if !excluded.is_empty() && !rows.is_empty() {
            debug!(?excluded, "dropping feature columns with no values");
        }

        let mut dataset = Self::new(keep.iter().map(|&j| names[j].clone()).collect());
        let mut filled = 0usize;
        for row in rows {
            let values = keep
                .iter()
                .map(|&j| {
                    row.values[j].unwrap_or_else(|| {
                        filled += 1;
                        MISSING_FILL
                    })
                })
                .collect();
            if let Some(target) = row.target {
                dataset.push(values, target, row.date);
            }
        }
        if filled > 0 {
            warn!(
                cells = filled,
                fill = MISSING_FILL,
                "filled undefined covariate cells in training data"
            );
        }
        dataset
    }

    pub fn push(&mut self, features: Vec<f64>, target: f64, date: NaiveDate) {
        debug_assert_eq!(features.len(), self.feature_names.len());
        self.features.push(features);
        self.targets.push(target);
        self.dates.push(date);
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
        }
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features[range.clone()].to_vec(),
            targets: self.targets[range.clone()].to_vec(),
            dates: self.dates[range].to_vec(),
        }
    }

    /// Keep only the named feature columns, in the order given.
    pub fn select_features(&self, names: &[String]) -> Result<Dataset, PricecastError> {
        let columns = names
            .iter()
            .map(|name| {
                self.feature_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| PricecastError::ModelAlignment {
                        reason: format!("dataset has no feature '{name}'"),
                    })
            })
            .collect::<Result<Vec<usize>, _>>()?;
        Ok(Dataset {
            feature_names: names.to_vec(),
            features: self
                .features
                .iter()
                .map(|row| columns.iter().map(|&j| row[j]).collect())
                .collect(),
            targets: self.targets.clone(),
            dates: self.dates.clone(),
        })
    }

    /// Split at `floor(n * (1 - test_ratio))`; every training date precedes
    /// every test date.
    pub fn chronological_split(
        &self,
        test_ratio: f64,
    ) -> Result<(Dataset, Dataset), PricecastError> {
        let n = self.n_samples();
        let cut = ((n as f64) * (1.0 - test_ratio)).floor() as usize;
        if cut == 0 || cut >= n {
            return Err(PricecastError::InsufficientHistory {
                stage: format!("chronological split at test ratio {test_ratio}"),
                have: n,
                need: minimum_split_rows(test_ratio),
            });
        }
        Ok((self.slice(0..cut), self.slice(cut..n)))
    }
}

/// Smallest sample count for which both sides of the split are non-empty.
fn minimum_split_rows(test_ratio: f64) -> usize {
    (2..10_000)
        .find(|&n| {
            let cut = ((n as f64) * (1.0 - test_ratio)).floor() as usize;
            cut > 0 && cut < n
        })
        .unwrap_or(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{FeatureConfig, build_features};
    use crate::domain::frame::{FrameRow, MergedFrame};
    use chrono::Days;

    fn date(d: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(d)
    }

    fn toy(n: usize) -> Dataset {
        let mut ds = Dataset::new(vec!["x".into()]);
        for i in 0..n {
            ds.push(vec![i as f64], i as f64 * 2.0, date(i as u64));
        }
        ds
    }

    #[test]
    fn split_is_chronological() {
        let (train, test) = toy(10).chronological_split(0.2).unwrap();
        assert_eq!(train.n_samples(), 8);
        assert_eq!(test.n_samples(), 2);
        assert!(train.dates.iter().max() < test.dates.iter().min());
    }

    #[test]
    fn split_with_empty_side_is_insufficient_history() {
        let err = toy(1).chronological_split(0.2).unwrap_err();
        assert!(matches!(
            err,
            PricecastError::InsufficientHistory { have: 1, .. }
        ));
        assert!(toy(0).chronological_split(0.2).is_err());
    }

    #[test]
    fn excludes_all_missing_columns_and_fills_gaps() {
        let mut frame = MergedFrame::new("Average_Price", vec!["Diesel".into(), "Empty".into()]);
        for d in 0..35u64 {
            let diesel = if d % 2 == 0 { Some(150.0) } else { None };
            frame
                .push(FrameRow {
                    date: date(d),
                    target: Some(50.0 + d as f64),
                    values: vec![diesel, None],
                })
                .unwrap();
        }
        let features = build_features(&frame, &FeatureConfig::default());
        let ds = Dataset::from_feature_frame(&features);
        assert_eq!(ds.n_samples(), 5);
        assert!(!ds.feature_names.contains(&"Empty".to_string()));
        let diesel = ds.feature_names.iter().position(|n| n == "Diesel").unwrap();
        assert_eq!(ds.features[0][diesel], 150.0);
        assert_eq!(ds.features[1][diesel], MISSING_FILL);
    }

    #[test]
    fn select_features_reorders_columns() {
        let mut ds = Dataset::new(vec!["a".into(), "b".into(), "c".into()]);
        ds.push(vec![1.0, 2.0, 3.0], 10.0, date(0));
        let picked = ds.select_features(&["c".into(), "a".into()]).unwrap();
        assert_eq!(picked.feature_names, vec!["c", "a"]);
        assert_eq!(picked.features[0], vec![3.0, 1.0]);
        assert_eq!(picked.targets, vec![10.0]);
        assert!(matches!(
            ds.select_features(&["z".into()]),
            Err(PricecastError::ModelAlignment { .. })
        ));
    }

    #[test]
    fn minimum_rows_for_default_ratio() {
        assert_eq!(minimum_split_rows(0.2), 2);
        assert_eq!(minimum_split_rows(0.5), 2);
    }
}
