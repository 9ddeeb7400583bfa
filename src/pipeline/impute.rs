//! Missing-value imputation
//!
//! Numeric columns take their batch mean; categorical columns take a fixed
//! per-column sentinel category. All policies come from [`ImputationConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::compute::sum;
use arrow::record_batch::RecordBatch;

use crate::config::ImputationConfig;
use crate::error::{PipelineError, Result};
use crate::schema::{CATEGORICAL_COLUMNS, MODEL_INPUT_COLUMNS};
use crate::utils::arrow::{float64_column, get_column, replace_column, string_column};

/// What the imputer changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputationReport {
    /// Mean used for each numeric column
    pub means: BTreeMap<String, f64>,
    /// Number of filled cells per column
    pub filled: BTreeMap<String, usize>,
    /// Number of rewritten categorical values per column
    pub replaced: BTreeMap<String, usize>,
}

impl ImputationReport {
    /// Total number of filled cells
    #[must_use]
    pub fn total_filled(&self) -> usize {
        self.filled.values().sum()
    }
}

/// Fills missing values according to an [`ImputationConfig`]
#[derive(Debug, Clone)]
pub struct Imputer {
    config: ImputationConfig,
}

impl Imputer {
    #[must_use]
    pub const fn new(config: ImputationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ImputationConfig {
        &self.config
    }

    /// Fill every configured column and verify no model input is left missing
    ///
    /// # Errors
    /// * `Imputation` if a numeric column has no values, a categorical column has
    ///   no sentinel, or a model input still has gaps afterwards
    /// * `Schema` if a configured column is absent
    pub fn impute(&self, batch: &RecordBatch) -> Result<(RecordBatch, ImputationReport)> {
        if let Some(column) = CATEGORICAL_COLUMNS
            .iter()
            .find(|c| self.config.sentinel(c).is_none())
        {
            return Err(PipelineError::imputation(
                column,
                "no sentinel category configured",
            ));
        }

        let mut report = ImputationReport::default();
        let mut batch = batch.clone();

        for column in &self.config.numeric {
            let values = float64_column(&batch, column)?;
            let mean = column_mean(column, values)?;
            let missing = values.null_count();
            let filled: Float64Array = values.iter().map(|v| Some(v.unwrap_or(mean))).collect();

            log::debug!("Filled {missing} missing values in {column} with mean {mean}");
            report.means.insert(column.clone(), mean);
            report.filled.insert(column.clone(), missing);
            batch = replace_column(&batch, column, Arc::new(filled), false)?;
        }

        for (column, sentinel) in &self.config.sentinels {
            let values = string_column(&batch, column)?;
            let missing = values.null_count();
            let mut rewritten = 0usize;
            let filled: StringArray = values
                .iter()
                .map(|v| match v {
                    None => Some(sentinel.as_str()),
                    Some(value) => match self.config.replacement(column, value) {
                        Some(replacement) => {
                            rewritten += 1;
                            Some(replacement)
                        }
                        None => Some(value),
                    },
                })
                .collect();

            log::debug!("Filled {missing} missing values in {column} with '{sentinel}'");
            report.filled.insert(column.clone(), missing);
            if rewritten > 0 {
                report.replaced.insert(column.clone(), rewritten);
            }
            batch = replace_column(&batch, column, Arc::new(filled), false)?;
        }

        check_no_missing(&batch)?;
        log::info!(
            "Imputed {} missing values across {} columns",
            report.total_filled(),
            report.filled.len()
        );
        Ok((batch, report))
    }
}

/// Mean over the non-missing values of a column
///
/// # Errors
/// Returns an imputation error if the column has no values at all
pub fn column_mean(column: &str, values: &Float64Array) -> Result<f64> {
    let present = values.len() - values.null_count();
    match sum(values) {
        Some(total) if present > 0 => Ok(total / present as f64),
        _ => Err(PipelineError::imputation(
            column,
            "column has no values, mean is undefined",
        )),
    }
}

/// Verify that no model input column present in the batch has a gap
fn check_no_missing(batch: &RecordBatch) -> Result<()> {
    for column in MODEL_INPUT_COLUMNS {
        if batch.schema().index_of(column).is_err() {
            continue;
        }
        let missing = get_column(batch, column)?.null_count();
        if missing > 0 {
            return Err(PipelineError::imputation(
                column,
                format!("{missing} values still missing after imputation"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueReplacement;
    use crate::schema::{
        AIRCRAFT_CATEGORY, ENGINE_TYPE, NUMBER_OF_ENGINES, TOTAL_UNINJURED, WEATHER_CONDITION,
    };
    use arrow::array::ArrayRef;
    use arrow_schema::{DataType, Field, Schema};

    fn config() -> ImputationConfig {
        ImputationConfig {
            numeric: vec![NUMBER_OF_ENGINES.to_string(), TOTAL_UNINJURED.to_string()],
            sentinels: CATEGORICAL_COLUMNS
                .iter()
                .map(|c| (c.to_string(), format!("{c}-missing")))
                .chain([
                    (ENGINE_TYPE.to_string(), "Others".to_string()),
                    (WEATHER_CONDITION.to_string(), "UNK".to_string()),
                ])
                .collect(),
            replacements: vec![ValueReplacement {
                column: ENGINE_TYPE.to_string(),
                values: vec!["None".to_string(), "Unknown".to_string()],
                replacement: "Others".to_string(),
            }],
        }
    }

    fn batch(engines: Vec<Option<f64>>, engine_type: Vec<Option<&str>>) -> RecordBatch {
        let rows = engines.len();
        let mut fields = vec![
            Field::new(NUMBER_OF_ENGINES, DataType::Float64, true),
            Field::new(TOTAL_UNINJURED, DataType::Float64, true),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(engines)),
            Arc::new(Float64Array::from(vec![Some(1.0); rows])),
        ];
        for column in CATEGORICAL_COLUMNS {
            fields.push(Field::new(column, DataType::Utf8, true));
            let values: StringArray = if column == ENGINE_TYPE {
                engine_type.iter().copied().collect()
            } else {
                (0..rows).map(|_| None::<&str>).collect()
            };
            columns.push(Arc::new(values));
        }
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn test_numeric_mean_fill() {
        let input = batch(
            vec![Some(1.0), None, Some(3.0), None],
            vec![Some("Turbo Fan"); 4],
        );
        let (output, report) = Imputer::new(config()).impute(&input).unwrap();

        let engines = float64_column(&output, NUMBER_OF_ENGINES).unwrap();
        assert_eq!(engines.null_count(), 0);
        assert_eq!(engines.values().to_vec(), vec![1.0, 2.0, 3.0, 2.0]);
        assert_eq!(report.means[NUMBER_OF_ENGINES], 2.0);
        assert_eq!(report.filled[NUMBER_OF_ENGINES], 2);
    }

    #[test]
    fn test_sentinel_and_replacement() {
        let input = batch(
            vec![Some(1.0); 4],
            vec![None, Some("None"), Some("Unknown"), Some("Turbo Jet")],
        );
        let (output, report) = Imputer::new(config()).impute(&input).unwrap();

        let engine_type = string_column(&output, ENGINE_TYPE).unwrap();
        let values: Vec<_> = engine_type.iter().flatten().collect();
        assert_eq!(values, vec!["Others", "Others", "Others", "Turbo Jet"]);
        assert_eq!(report.replaced[ENGINE_TYPE], 2);

        let category = string_column(&output, AIRCRAFT_CATEGORY).unwrap();
        assert_eq!(category.value(0), "Aircraft_Category-missing");
    }

    #[test]
    fn test_no_missing_after_imputation() {
        let input = batch(
            vec![None, Some(2.0), None],
            vec![None, None, Some("Reciprocating")],
        );
        let (output, _) = Imputer::new(config()).impute(&input).unwrap();
        for column in output.schema().fields() {
            assert_eq!(
                get_column(&output, column.name()).unwrap().null_count(),
                0,
                "{}",
                column.name()
            );
        }
    }

    #[test]
    fn test_entirely_missing_numeric_column() {
        let input = batch(vec![None, None], vec![Some("Turbo Fan"); 2]);
        match Imputer::new(config()).impute(&input).unwrap_err() {
            PipelineError::Imputation { column, .. } => assert_eq!(column, NUMBER_OF_ENGINES),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_rows_is_imputation_error() {
        let input = batch(vec![], vec![]);
        assert_eq!(input.num_rows(), 0);
        match Imputer::new(config()).impute(&input).unwrap_err() {
            PipelineError::Imputation { column, message } => {
                assert_eq!(column, NUMBER_OF_ENGINES);
                assert!(message.contains("no values"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sentinel_is_not_replaced() {
        let mut config = config();
        config
            .sentinels
            .insert(ENGINE_TYPE.to_string(), "Unknown".to_string());
        let input = batch(vec![Some(1.0); 2], vec![None, Some("Unknown")]);
        let (output, report) = Imputer::new(config).impute(&input).unwrap();

        let engine_type = string_column(&output, ENGINE_TYPE).unwrap();
        assert_eq!(engine_type.value(0), "Unknown");
        assert_eq!(engine_type.value(1), "Others");
        assert_eq!(report.replaced[ENGINE_TYPE], 1);
    }

    #[test]
    fn test_unconfigured_model_input_is_rejected() {
        let mut config = config();
        config.numeric.retain(|c| c != NUMBER_OF_ENGINES);
        let input = batch(vec![None, Some(1.0)], vec![Some("Turbo Fan"); 2]);
        assert!(matches!(
            Imputer::new(config).impute(&input),
            Err(PipelineError::Imputation { .. })
        ));
    }

    #[test]
    fn test_missing_sentinel_is_rejected() {
        let mut config = config();
        config.sentinels.remove(WEATHER_CONDITION);
        let input = batch(vec![Some(1.0)], vec![Some("Turbo Fan")]);
        assert!(matches!(
            Imputer::new(config).impute(&input),
            Err(PipelineError::Imputation { .. })
        ));
    }
}
