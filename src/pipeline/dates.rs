//! Event date decomposition
//!
//! `Event_Date` is written `M/D/YYYY`. The separator and field order are
//! fixed; there is no locale handling.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int32Array};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field};
use chrono::{Datelike, NaiveDate};

use crate::error::{PipelineError, Result};
use crate::schema::{DAY, EVENT_DATE, MONTH, YEAR};
use crate::utils::arrow::{append_columns, drop_column, event_ids, string_column};

/// Parse a `M/D/YYYY` date
///
/// Each component must be an unsigned decimal integer; the year has four
/// digits, month and day at most two. The date must exist in the calendar.
pub fn parse_event_date(text: &str) -> std::result::Result<NaiveDate, String> {
    let parts: Vec<&str> = text.trim().split('/').collect();
    let &[month, day, year] = parts.as_slice() else {
        return Err(format!("'{text}' is not in M/D/YYYY form"));
    };

    let component = |value: &str, name: &str, max_digits: usize| {
        if value.is_empty()
            || value.len() > max_digits
            || !value.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(format!("invalid {name} '{value}' in '{text}'"));
        }
        value
            .parse::<u32>()
            .map_err(|_| format!("invalid {name} '{value}' in '{text}'"))
    };

    let month = component(month, "month", 2)?;
    let day = component(day, "day", 2)?;
    if year.len() != 4 {
        return Err(format!("year must have four digits in '{text}'"));
    }
    let year = component(year, "year", 4)?;

    if !(1..=12).contains(&month) {
        return Err(format!("month {month} out of range in '{text}'"));
    }

    let year = i32::try_from(year).map_err(|_| format!("invalid year in '{text}'"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("day {day} out of range for month {month} in '{text}'"))
}

/// Replaces `Event_Date` with integer `year`, `month` and `day` columns
#[derive(Debug, Clone, Copy, Default)]
pub struct DateDecomposer;

impl DateDecomposer {
    /// Decompose the event date of every row
    ///
    /// # Errors
    /// Returns a parse error naming the event for a missing or malformed date
    pub fn decompose(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let ids = event_ids(batch)?;
        let dates = string_column(batch, EVENT_DATE)?;

        let mut years = Vec::with_capacity(dates.len());
        let mut months = Vec::with_capacity(dates.len());
        let mut days = Vec::with_capacity(dates.len());

        for row in 0..dates.len() {
            if dates.is_null(row) {
                return Err(PipelineError::parse(
                    EVENT_DATE,
                    ids.value(row),
                    "event date is missing",
                ));
            }
            let date = parse_event_date(dates.value(row))
                .map_err(|message| PipelineError::parse(EVENT_DATE, ids.value(row), message))?;
            years.push(date.year());
            months.push(date.month() as i32);
            days.push(date.day() as i32);
        }

        let int_column = |name: &str, values: Vec<i32>| {
            (
                Field::new(name, DataType::Int32, false),
                Arc::new(Int32Array::from(values)) as ArrayRef,
            )
        };

        let without_date = drop_column(batch, EVENT_DATE)?;
        append_columns(
            &without_date,
            vec![
                int_column(YEAR, years),
                int_column(MONTH, months),
                int_column(DAY, days),
            ],
        )
    }
}
