//! Utilities for working with Arrow arrays.
//!
//! Column lookup, downcasting and column replacement on record batches. The
//! pipeline stages rebuild one column at a time and swap it into the batch
//! with these helpers.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema};

use crate::error::{PipelineError, Result};

/// Get a column from a record batch by name
///
/// # Errors
/// Returns a schema error naming the column if it does not exist
pub fn get_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a ArrayRef> {
    let idx = batch.schema().index_of(column_name).map_err(|_| {
        PipelineError::Schema(format!("column '{column_name}' not found in record batch"))
    })?;
    Ok(batch.column(idx))
}

/// Downcast a column to a specific array type with clear error messages
///
/// # Type Parameters
/// * `T` - The Arrow array type to downcast to
///
/// # Arguments
/// * `array` - The array to downcast
/// * `column_name` - Column name used in the error message
/// * `type_name` - Human readable name of the expected type
pub fn downcast_array<'a, T: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    type_name: &str,
) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        PipelineError::Schema(format!(
            "column '{column_name}' has type {}, expected {type_name}",
            array.data_type()
        ))
    })
}

/// Replace a column, keeping its position and adopting the new array's type
pub fn replace_column(
    batch: &RecordBatch,
    column_name: &str,
    array: ArrayRef,
    nullable: bool,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = schema.index_of(column_name).map_err(|_| {
        PipelineError::Schema(format!("column '{column_name}' not found in record batch"))
    })?;

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[idx] = Field::new(column_name, array.data_type().clone(), nullable);

    let mut columns = batch.columns().to_vec();
    columns[idx] = array;

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Append columns at the end of a batch
pub fn append_columns(batch: &RecordBatch, new_columns: Vec<(Field, ArrayRef)>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();

    for (field, array) in new_columns {
        fields.push(field);
        columns.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Drop a column by name
pub fn drop_column(batch: &RecordBatch, column_name: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = schema.index_of(column_name).map_err(|_| {
        PipelineError::Schema(format!("column '{column_name}' not found in record batch"))
    })?;
    let keep: Vec<usize> = (0..batch.num_columns()).filter(|&i| i != idx).collect();
    Ok(batch.project(&keep)?)
}

/// Project a batch onto the named columns, in the given order
pub fn project_columns(batch: &RecordBatch, columns: &[&str]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = columns
        .iter()
        .map(|name| {
            schema.index_of(name).map_err(|_| {
                PipelineError::Schema(format!("column '{name}' not found in record batch"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}
