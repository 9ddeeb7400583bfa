//! Typed column extraction for record batches
//!
//! Thin wrappers over [`get_column`] and [`downcast_array`] for the array
//! types the pipeline works with.

use arrow::array::{Float64Array, Int32Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::schema::EVENT_ID;
use crate::utils::arrow::array_utils::{downcast_array, get_column};

/// Extract a Utf8 column
pub fn string_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a StringArray> {
    downcast_array::<StringArray>(get_column(batch, column_name)?, column_name, "Utf8")
}

/// Extract a Float64 column
pub fn float64_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a Float64Array> {
    downcast_array::<Float64Array>(get_column(batch, column_name)?, column_name, "Float64")
}

/// Extract an Int32 column
pub fn int32_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a Int32Array> {
    downcast_array::<Int32Array>(get_column(batch, column_name)?, column_name, "Int32")
}

/// Extract a microsecond timestamp column
pub fn timestamp_column<'a>(
    batch: &'a RecordBatch,
    column_name: &str,
) -> Result<&'a TimestampMicrosecondArray> {
    downcast_array::<TimestampMicrosecondArray>(
        get_column(batch, column_name)?,
        column_name,
        "Timestamp(Microsecond)",
    )
}

/// Extract the identifier column
pub fn event_ids(batch: &RecordBatch) -> Result<&StringArray> {
    string_column(batch, EVENT_ID)
}
