//! Raw incident record loading
//!
//! Reads the delimited incident export into a record batch in which every
//! column is nullable Utf8. Type conversion happens later, in the selector.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};
use encoding_rs::WINDOWS_1252;

use crate::error::util::safe_read_bytes;
use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

const UTF8_BOM: &str = "\u{feff}";

/// Decode raw input bytes as UTF-8, falling back to Windows-1252
///
/// The incident export is produced in the legacy Windows code page; newer
/// exports are UTF-8. Windows-1252 maps every byte, so the fallback never fails.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix(UTF8_BOM).unwrap_or(text)),
        Err(_) => {
            log::debug!("Input is not valid UTF-8, decoding as Windows-1252");
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text
        }
    }
}

/// Read a delimited file into a record batch of Utf8 columns
pub fn load_records(path: &Path, delimiter: u8) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Loading incident records from", path);

    let bytes = safe_read_bytes(path, "loading incident records")?;
    let batch = load_records_from_bytes(&bytes, delimiter)?;

    log_operation_complete("loaded", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Parse delimited bytes with a header row into a record batch
///
/// Blank cells become nulls. A row whose field count differs from the
/// header is rejected with its line number.
pub fn load_records_from_bytes(bytes: &[u8], delimiter: u8) -> Result<RecordBatch> {
    let text = decode_text(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(PipelineError::Schema(
            "input contains no header row".to_string(),
        ));
    }

    let mut builders: Vec<StringBuilder> = headers.iter().map(|_| StringBuilder::new()).collect();

    for result in reader.records() {
        let record = result?;
        if record.len() != headers.len() {
            let line = record.position().map_or(0, csv::Position::line);
            return Err(PipelineError::Schema(format!(
                "line {line} has {} fields, header has {}",
                record.len(),
                headers.len()
            )));
        }

        for (builder, value) in builders.iter_mut().zip(record.iter()) {
            let value = value.trim();
            if value.is_empty() {
                builder.append_null();
            } else {
                builder.append_value(value);
            }
        }
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = builders
        .iter_mut()
        .map(|builder| Arc::new(builder.finish()) as ArrayRef)
        .collect();

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
