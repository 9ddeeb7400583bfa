//! Categorical encoding
//!
//! Each categorical column is mapped to small integer codes. Codes follow the
//! lexical (byte-wise UTF-8) order of the distinct values, starting at 0, so
//! the same set of values always produces the same codes. Mappings are
//! persisted next to the output tables and can be reloaded so that later
//! runs and the serving path encode identically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Int32Array};
use arrow::record_batch::RecordBatch;
use arrow_schema::FieldRef;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::schema::{CATEGORICAL_COLUMNS, mapping_schema};
use crate::utils::arrow::{event_ids, replace_column, string_column};
use crate::utils::io::parquet::read_parquet;

/// Code assigned to a value absent from a persisted mapping
pub const UNSEEN_CODE: i32 = -1;

/// One row of a mapping side-table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub value: String,
    pub code: i32,
}

/// Value-to-code mapping of one categorical column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMapping {
    values: Vec<String>,
    index: FxHashMap<String, i32>,
}

impl CategoryMapping {
    /// Build a mapping from the distinct values, in lexical order
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let values: Vec<String> = values
            .into_iter()
            .sorted_unstable()
            .dedup()
            .map(str::to_string)
            .collect();
        Self::from_sorted(values)
    }

    fn from_sorted(values: Vec<String>) -> Self {
        let index = values
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code as i32))
            .collect();
        Self { values, index }
    }

    /// Rebuild a mapping from persisted entries
    ///
    /// # Errors
    /// Returns an encoding error unless the codes are exactly `0..n` and every
    /// value appears once
    pub fn from_entries(column: &str, entries: Vec<MappingEntry>) -> Result<Self> {
        let entries: Vec<MappingEntry> = entries.into_iter().sorted_by_key(|e| e.code).collect();
        for (expected, entry) in entries.iter().enumerate() {
            if entry.code != expected as i32 {
                return Err(PipelineError::encoding(
                    column,
                    format!("persisted codes are not contiguous at code {}", entry.code),
                ));
            }
        }

        let mapping = Self::from_sorted(entries.into_iter().map(|e| e.value).collect());
        if mapping.index.len() != mapping.values.len() {
            return Err(PipelineError::encoding(
                column,
                "persisted mapping assigns several codes to one value",
            ));
        }
        Ok(mapping)
    }

    /// Code of a value, if known
    #[must_use]
    pub fn code(&self, value: &str) -> Option<i32> {
        self.index.get(value).copied()
    }

    /// Code of a value, or [`UNSEEN_CODE`]
    #[must_use]
    pub fn encode(&self, value: &str) -> i32 {
        self.code(value).unwrap_or(UNSEEN_CODE)
    }

    /// Value of a code
    #[must_use]
    pub fn value(&self, code: i32) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries ordered by code
    #[must_use]
    pub fn entries(&self) -> Vec<MappingEntry> {
        self.values
            .iter()
            .enumerate()
            .map(|(code, value)| MappingEntry {
                value: value.clone(),
                code: code as i32,
            })
            .collect()
    }

    /// Convert to a mapping side-table batch
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields: Vec<FieldRef> = mapping_schema().fields().iter().map(Arc::clone).collect();
        Ok(serde_arrow::to_record_batch(&fields, &self.entries())?)
    }

    /// Rebuild from mapping side-table batches
    pub fn from_record_batches(column: &str, batches: &[RecordBatch]) -> Result<Self> {
        let mut entries = Vec::new();
        for batch in batches {
            let rows: Vec<MappingEntry> = serde_arrow::from_record_batch(batch)?;
            entries.extend(rows);
        }
        Self::from_entries(column, entries)
    }
}

/// Mappings of every categorical column, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMappings {
    columns: BTreeMap<String, CategoryMapping>,
}

impl CategoryMappings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &str, mapping: CategoryMapping) {
        self.columns.insert(column.to_string(), mapping);
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&CategoryMapping> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryMapping)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Path of a column's side-table inside a mapping directory
    #[must_use]
    pub fn table_path(dir: &Path, column: &str) -> PathBuf {
        dir.join(format!("{column}.parquet"))
    }

    /// Whether a mapping directory holds a side-table for every categorical column
    #[must_use]
    pub fn exist_in(dir: &Path) -> bool {
        CATEGORICAL_COLUMNS
            .iter()
            .all(|column| Self::table_path(dir, column).is_file())
    }

    /// Load the side-tables of every categorical column
    pub fn load(dir: &Path) -> Result<Self> {
        let mut mappings = Self::new();
        for column in CATEGORICAL_COLUMNS {
            let batches = read_parquet(&Self::table_path(dir, column))?;
            mappings.insert(column, CategoryMapping::from_record_batches(column, &batches)?);
        }
        log::info!(
            "Loaded category mappings for {} columns from {}",
            mappings.len(),
            dir.display()
        );
        Ok(mappings)
    }
}

/// Result of encoding a batch
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub batch: RecordBatch,
    pub mappings: CategoryMappings,
    /// Per column, the number of values encoded as [`UNSEEN_CODE`]
    pub unseen: BTreeMap<String, usize>,
}

/// Encodes categorical columns to integer codes
#[derive(Debug, Clone, Default)]
pub struct CategoryEncoder {
    fixed: Option<CategoryMappings>,
}

impl CategoryEncoder {
    /// Encoder that derives mappings from each batch
    #[must_use]
    pub fn fit() -> Self {
        Self { fixed: None }
    }

    /// Encoder that reuses persisted mappings; unseen values become [`UNSEEN_CODE`]
    #[must_use]
    pub const fn with_mappings(mappings: CategoryMappings) -> Self {
        Self {
            fixed: Some(mappings),
        }
    }

    /// Encode every categorical column of the batch
    ///
    /// # Errors
    /// Returns an encoding error naming the event if a categorical value is
    /// missing, or if a fixed mapping lacks a column
    pub fn encode(&self, batch: &RecordBatch) -> Result<EncodedBatch> {
        let ids = event_ids(batch)?.clone();
        let mut encoded = batch.clone();
        let mut mappings = CategoryMappings::new();
        let mut unseen = BTreeMap::new();

        for column in CATEGORICAL_COLUMNS {
            let values = string_column(&encoded, column)?;
            if let Some(row) = (0..values.len()).find(|&row| values.is_null(row)) {
                return Err(PipelineError::encoding(
                    column,
                    format!(
                        "missing value for event '{}' after imputation",
                        ids.value(row)
                    ),
                ));
            }

            let mapping = match &self.fixed {
                Some(fixed) => fixed.get(column).cloned().ok_or_else(|| {
                    PipelineError::encoding(column, "no persisted mapping for column")
                })?,
                None => CategoryMapping::fit(values.iter().flatten()),
            };

            let codes: Int32Array = values
                .iter()
                .flatten()
                .map(|value| mapping.encode(value))
                .collect::<Vec<i32>>()
                .into();
            let unseen_count = codes.values().iter().filter(|&&c| c == UNSEEN_CODE).count();
            if unseen_count > 0 {
                log::warn!("{unseen_count} values in {column} are absent from the persisted mapping");
                unseen.insert(column.to_string(), unseen_count);
            }

            log::debug!("Encoded {column} with {} categories", mapping.len());
            mappings.insert(column, mapping);
            encoded = replace_column(&encoded, column, Arc::new(codes), false)?;
        }

        Ok(EncodedBatch {
            batch: encoded,
            mappings,
            unseen,
        })
    }
}
