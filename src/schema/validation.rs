//! Schema and identifier validation.

use arrow::array::{Array, StringArray};
use arrow_schema::Schema;
use rustc_hash::FxHashSet;

use crate::error::{PipelineError, Result};
use crate::schema::EVENT_ID;

/// Check that every named column exists in the schema
///
/// # Errors
/// Returns a schema error listing all absent columns at once
pub fn require_columns(schema: &Schema, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| schema.index_of(name).is_err())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema(format!(
            "missing required columns: {}",
            missing.join(", ")
        )))
    }
}

/// Check that identifiers are present, non-blank and unique
pub fn validate_identifiers(ids: &StringArray) -> Result<()> {
    let mut seen = FxHashSet::default();
    seen.reserve(ids.len());

    for row in 0..ids.len() {
        if ids.is_null(row) || ids.value(row).trim().is_empty() {
            return Err(PipelineError::Schema(format!(
                "{EVENT_ID} is missing at row {row}"
            )));
        }
        let id = ids.value(row);
        if !seen.insert(id) {
            return Err(PipelineError::Schema(format!(
                "duplicate {EVENT_ID} '{id}' at row {row}"
            )));
        }
    }

    Ok(())
}
