//! Training-set assembly and regression metrics
//!
//! Labels are inner-joined to features on `Event_Id`. Incidents with an
//! undefined fatality ratio have no target and are left out. Incidents after
//! an optional timestamp cutoff are held out as unseen data.

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::record_batch::RecordBatch;
use arrow_schema::DataType;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashMap;

use crate::error::{PipelineError, Result};
use crate::schema::{EVENT_TIMESTAMP, RATIO, model_input_order};
use crate::utils::arrow::{
    downcast_array, event_ids, float64_column, get_column, timestamp_column,
};

/// Default share of rows held out for testing
pub const DEFAULT_TEST_FRACTION: f64 = 0.25;

/// Design matrix and targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    /// Input column names, in column order of `rows`
    pub feature_names: Vec<&'static str>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub event_ids: Vec<String>,
    /// Incidents after the cutoff, left out of `rows`
    pub held_out: Vec<String>,
}

impl TrainingSet {
    /// Join the label table to the feature table
    ///
    /// Rows follow label table order. A defined label without a feature row
    /// is a schema error.
    pub fn assemble(features: &RecordBatch, labels: &RecordBatch) -> Result<Self> {
        Self::assemble_until(features, labels, None)
    }

    /// Join as [`TrainingSet::assemble`], holding out every incident whose
    /// event timestamp is later than `cutoff`
    pub fn assemble_until(
        features: &RecordBatch,
        labels: &RecordBatch,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let feature_names = model_input_order();
        let inputs: Vec<Float64Array> = feature_names
            .iter()
            .map(|&column| {
                let array = cast(get_column(features, column)?, &DataType::Float64)?;
                Ok(downcast_array::<Float64Array>(&array, column, "Float64")?.clone())
            })
            .collect::<Result<_>>()?;

        let feature_ids = event_ids(features)?;
        let position: FxHashMap<&str, usize> = feature_ids
            .iter()
            .enumerate()
            .filter_map(|(row, id)| id.map(|id| (id, row)))
            .collect();

        let label_ids = event_ids(labels)?;
        let ratios = float64_column(labels, RATIO)?;
        let timestamps = timestamp_column(labels, EVENT_TIMESTAMP)?;
        let cutoff = cutoff.map(|c| c.timestamp_micros());

        let mut set = Self {
            feature_names,
            ..Self::default()
        };
        for (row, id) in label_ids.iter().enumerate() {
            let Some(id) = id else { continue };
            if cutoff.is_some_and(|c| timestamps.value(row) > c) {
                set.held_out.push(id.to_string());
                continue;
            }
            if ratios.is_null(row) {
                continue;
            }
            let &feature_row = position.get(id).ok_or_else(|| {
                PipelineError::Schema(format!("label for '{id}' has no feature row"))
            })?;

            set.rows
                .push(inputs.iter().map(|a| a.value(feature_row)).collect());
            set.targets.push(ratios.value(row));
            set.event_ids.push(id.to_string());
        }

        log::info!(
            "Assembled training set: {} of {} labelled incidents",
            set.len(),
            labels.num_rows()
        );
        if !set.held_out.is_empty() {
            log::info!("Held out {} incidents after the cutoff", set.held_out.len());
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            event_ids: indices.iter().map(|&i| self.event_ids[i].clone()).collect(),
            held_out: Vec::new(),
        }
    }

    /// Shuffle with a seed and split into `(train, test)`
    ///
    /// The test part holds `ceil(len * test_fraction)` rows.
    ///
    /// # Errors
    /// Returns a configuration error unless `0 < test_fraction < 1`
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "test fraction must be between 0 and 1, got {test_fraction}"
            )));
        }

        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));

        let test_len = ((self.len() as f64) * test_fraction).ceil() as usize;
        let (test, train) = indices.split_at(test_len.min(self.len()));
        Ok((self.subset(train), self.subset(test)))
    }

    /// Mean, minimum and maximum of the targets
    #[must_use]
    pub fn target_stats(&self) -> Option<(f64, f64, f64)> {
        if self.is_empty() {
            return None;
        }
        let mean = self.targets.iter().sum::<f64>() / self.len() as f64;
        let min = self.targets.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((mean, min, max))
    }
}

/// Error measures of a regression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    /// `None` when the actual values have zero variance
    pub r2: Option<f64>,
}

impl RegressionMetrics {
    /// # Errors
    /// Returns a configuration error if the slices are empty or differ in length
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Result<Self> {
        if predicted.len() != actual.len() || actual.is_empty() {
            return Err(PipelineError::Config(format!(
                "cannot score {} predictions against {} targets",
                predicted.len(),
                actual.len()
            )));
        }

        let n = actual.len() as f64;
        let (squared, absolute) = predicted
            .iter()
            .zip(actual)
            .fold((0.0, 0.0), |(sq, abs), (p, a)| {
                let error = p - a;
                (sq + error * error, abs + error.abs())
            });
        let mean = actual.iter().sum::<f64>() / n;
        let total: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

        let mse = squared / n;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: absolute / n,
            r2: (total > 0.0).then(|| 1.0 - squared / total),
        })
    }
}
