//! Feature selection and typing
//!
//! Projects the raw table onto the identifier, the modeling columns, the
//! event date and the event timestamp, converting numeric and timestamp
//! text into typed Arrow arrays on the way.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, Result};
use crate::pipeline::dates::parse_event_date;
use crate::schema::{
    EVENT_DATE, EVENT_ID, EVENT_TIMESTAMP, is_numeric, require_columns, selected_columns,
    selected_schema, validate_identifiers,
};
use crate::utils::arrow::{event_ids, string_column};

/// Accepted layouts for the event timestamp, tried after RFC 3339
pub const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Accepted layouts for a date-only event timestamp (midnight UTC)
pub const TIMESTAMP_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Projects a raw batch onto the columns the pipeline needs
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureSelector {
    derive_timestamp_from_event_date: bool,
}

impl FeatureSelector {
    #[must_use]
    pub const fn new(derive_timestamp_from_event_date: bool) -> Self {
        Self {
            derive_timestamp_from_event_date,
        }
    }

    /// Select and type the needed columns
    ///
    /// # Errors
    /// * `Schema` if a required column is absent or an identifier is blank or repeated
    /// * `Parse` if a numeric or timestamp cell cannot be converted
    pub fn select(&self, raw: &RecordBatch) -> Result<RecordBatch> {
        let schema = raw.schema();
        let has_timestamp = schema.index_of(EVENT_TIMESTAMP).is_ok();
        let derive_timestamp = !has_timestamp && self.derive_timestamp_from_event_date;

        let required: Vec<&str> = selected_columns()
            .into_iter()
            .filter(|c| !(derive_timestamp && *c == EVENT_TIMESTAMP))
            .collect();
        require_columns(&schema, &required)?;

        let ids = event_ids(raw)?;
        validate_identifiers(ids)?;

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(required.len() + 1);
        for column in selected_columns() {
            let array: ArrayRef = if column == EVENT_TIMESTAMP {
                if derive_timestamp {
                    log::info!("No {EVENT_TIMESTAMP} column, deriving it from {EVENT_DATE}");
                    Arc::new(derive_timestamps(string_column(raw, EVENT_DATE)?, ids)?)
                } else {
                    Arc::new(parse_timestamps(string_column(raw, EVENT_TIMESTAMP)?, ids)?)
                }
            } else if is_numeric(column) {
                Arc::new(parse_numeric(column, string_column(raw, column)?, ids)?)
            } else {
                Arc::new(string_column(raw, column)?.clone())
            };
            columns.push(array);
        }

        Ok(RecordBatch::try_new(selected_schema(), columns)?)
    }
}

/// Convert a numeric text column into Float64, keeping blanks as nulls
///
/// Counts cannot be negative; a negative or non-finite value is rejected.
pub fn parse_numeric(
    column: &str,
    values: &StringArray,
    ids: &StringArray,
) -> Result<Float64Array> {
    values
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(None),
            Some(text) => match text.trim().parse::<f64>() {
                Ok(number) if number.is_finite() && number >= 0.0 => Ok(Some(number)),
                Ok(number) => Err(PipelineError::parse(
                    column,
                    ids.value(row),
                    format!("expected a non-negative count, got {number}"),
                )),
                Err(_) => Err(PipelineError::parse(
                    column,
                    ids.value(row),
                    format!("'{text}' is not a number"),
                )),
            },
        })
        .collect()
}

/// Parse a single timestamp cell into microseconds since the epoch (UTC)
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_micros());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }
    for format in TIMESTAMP_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_micros());
        }
    }
    None
}

fn parse_timestamps(values: &StringArray, ids: &StringArray) -> Result<TimestampMicrosecondArray> {
    let micros = (0..values.len())
        .map(|row| {
            if values.is_null(row) {
                return Err(PipelineError::parse(
                    EVENT_TIMESTAMP,
                    ids.value(row),
                    "timestamp is missing",
                ));
            }
            let text = values.value(row);
            parse_timestamp(text).ok_or_else(|| {
                PipelineError::parse(
                    EVENT_TIMESTAMP,
                    ids.value(row),
                    format!("unrecognised timestamp '{text}'"),
                )
            })
        })
        .collect::<Result<Vec<i64>>>()?;

    Ok(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
}

fn derive_timestamps(dates: &StringArray, ids: &StringArray) -> Result<TimestampMicrosecondArray> {
    let micros = (0..dates.len())
        .map(|row| {
            let text = (!dates.is_null(row)).then(|| dates.value(row)).unwrap_or("");
            let date = parse_event_date(text)
                .map_err(|message| PipelineError::parse(EVENT_DATE, ids.value(row), message))?;
            date.and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_micros())
                .ok_or_else(|| PipelineError::parse(EVENT_DATE, ids.value(row), "invalid date"))
        })
        .collect::<Result<Vec<i64>>>()?;

    Ok(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
}
