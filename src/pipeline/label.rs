//! Fatality ratio label
//!
//! `ratio = fatal / (fatal + serious + minor + uninjured)`. A zero
//! denominator or a missing fatal count leaves the ratio undefined. That is
//! an expected data condition: the row is counted, written with a null
//! ratio, and excluded later by the training-set assembly.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::schema::{
    EVENT_ID, EVENT_TIMESTAMP, TOTAL_FATAL_INJURIES, TOTAL_MINOR_INJURIES,
    TOTAL_SERIOUS_INJURIES, TOTAL_UNINJURED, label_schema,
};
use crate::utils::arrow::{float64_column, get_column};

/// Fatality ratio of one incident, `None` when undefined
#[must_use]
pub fn fatality_ratio(
    fatal: Option<f64>,
    serious: Option<f64>,
    minor: Option<f64>,
    uninjured: Option<f64>,
) -> Option<f64> {
    let fatal = fatal?;
    let total = fatal + serious? + minor? + uninjured?;
    (total > 0.0).then(|| fatal / total)
}

/// Counts of defined and undefined labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSummary {
    pub defined: usize,
    pub undefined: usize,
}

impl LabelSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.defined + self.undefined
    }
}

/// Computes the label column and the label table
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelDeriver;

impl LabelDeriver {
    /// Ratio for every row; undefined ratios are nulls
    pub fn derive(&self, batch: &RecordBatch) -> Result<(Float64Array, LabelSummary)> {
        let fatal = float64_column(batch, TOTAL_FATAL_INJURIES)?;
        let serious = float64_column(batch, TOTAL_SERIOUS_INJURIES)?;
        let minor = float64_column(batch, TOTAL_MINOR_INJURIES)?;
        let uninjured = float64_column(batch, TOTAL_UNINJURED)?;

        let value = |array: &Float64Array, row: usize| {
            (!array.is_null(row)).then(|| array.value(row))
        };

        let ratios: Float64Array = (0..batch.num_rows())
            .map(|row| {
                fatality_ratio(
                    value(fatal, row),
                    value(serious, row),
                    value(minor, row),
                    value(uninjured, row),
                )
            })
            .collect();

        let summary = LabelSummary {
            defined: ratios.len() - ratios.null_count(),
            undefined: ratios.null_count(),
        };
        if summary.undefined > 0 {
            log::info!(
                "{} of {} incidents have an undefined fatality ratio",
                summary.undefined,
                summary.total()
            );
        }

        Ok((ratios, summary))
    }

    /// Build the `(Event_Id, ratio, event_timestamp)` label table
    pub fn label_table(&self, batch: &RecordBatch) -> Result<(RecordBatch, LabelSummary)> {
        let (ratios, summary) = self.derive(batch)?;
        let columns: Vec<ArrayRef> = vec![
            Arc::clone(get_column(batch, EVENT_ID)?),
            Arc::new(ratios),
            Arc::clone(get_column(batch, EVENT_TIMESTAMP)?),
        ];
        Ok((RecordBatch::try_new(label_schema(), columns)?, summary))
    }
}
