//! Configuration for the preprocessing pipeline.
//!
//! Defaults fit the incident export as published. A JSON file can override any
//! subset of fields, and a few environment variables override the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::util::safe_read_bytes;
use crate::error::{PipelineError, Result};
use crate::schema::{
    AIRCRAFT_CATEGORY, AIRCRAFT_DAMAGE, BROAD_PHASE_OF_FLIGHT, ENGINE_TYPE, INVESTIGATION_TYPE,
    NUMBER_OF_ENGINES, PURPOSE_OF_FLIGHT, TOTAL_MINOR_INJURIES, TOTAL_SERIOUS_INJURIES,
    TOTAL_UNINJURED, WEATHER_CONDITION,
};

/// Environment variable overriding the input CSV path
pub const ENV_INPUT: &str = "AVIATION_INPUT";
/// Environment variable overriding the output directory
pub const ENV_OUTPUT_DIR: &str = "AVIATION_OUTPUT_DIR";
/// Environment variable overriding the Parquet row group size
pub const ENV_ROW_GROUP_SIZE: &str = "AVIATION_ROW_GROUP_SIZE";

/// Default maximum rows per Parquet row group
pub const DEFAULT_ROW_GROUP_SIZE: usize = 65536;

/// Configuration for the pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw incident CSV
    pub input: PathBuf,
    /// Directory receiving the feature, label and mapping tables
    pub output_dir: PathBuf,
    /// Field delimiter of the input
    pub delimiter: u8,
    /// File name of the feature table
    pub features_file: String,
    /// File name of the label table
    pub labels_file: String,
    /// Subdirectory holding one mapping table per categorical column
    pub mappings_dir: String,
    /// Encode with mappings persisted by a previous run instead of refitting
    pub reuse_mappings: bool,
    /// Use midnight UTC of the event date when the input has no timestamp column
    pub derive_timestamp_from_event_date: bool,
    /// Missing-value policies
    pub imputation: ImputationConfig,
    /// Parquet writer settings
    pub writer: WriterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("Aviation/data/aviation.csv"),
            output_dir: PathBuf::from("Aviation/data"),
            delimiter: b',',
            features_file: "aviation_data.parquet".to_string(),
            labels_file: "aviation_fatal_data.parquet".to_string(),
            mappings_dir: "mappings".to_string(),
            reuse_mappings: false,
            derive_timestamp_from_event_date: false,
            imputation: ImputationConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = safe_read_bytes(path, "pipeline configuration")?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::Config(format!("invalid configuration {}: {e}", path.display()))
        })
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(input) = lookup(ENV_INPUT) {
            self.input = PathBuf::from(input);
        }
        if let Some(output_dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(output_dir);
        }
        if let Some(size) = lookup(ENV_ROW_GROUP_SIZE) {
            self.writer.max_row_group_size = size.parse::<usize>().map_err(|_| {
                PipelineError::Config(format!("{ENV_ROW_GROUP_SIZE} must be an integer, got '{size}'"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the field delimiter from a character
    ///
    /// # Errors
    /// Returns a configuration error unless the character is ASCII
    pub fn set_delimiter(&mut self, delimiter: char) -> Result<()> {
        if !delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter '{delimiter}' is not an ASCII character"
            )));
        }
        self.delimiter = delimiter as u8;
        Ok(())
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter byte {:#04x} is not ASCII",
                self.delimiter
            )));
        }
        if self.writer.max_row_group_size == 0 {
            return Err(PipelineError::Config(
                "max_row_group_size must be positive".to_string(),
            ));
        }
        if self.features_file == self.labels_file {
            return Err(PipelineError::Config(
                "feature and label tables must use different file names".to_string(),
            ));
        }
        self.imputation.validate()
    }

    /// Path of the feature table
    #[must_use]
    pub fn features_path(&self) -> PathBuf {
        self.output_dir.join(&self.features_file)
    }

    /// Path of the label table
    #[must_use]
    pub fn labels_path(&self) -> PathBuf {
        self.output_dir.join(&self.labels_file)
    }

    /// Directory of the mapping side-tables
    #[must_use]
    pub fn mappings_path(&self) -> PathBuf {
        self.output_dir.join(&self.mappings_dir)
    }
}

/// A value rewrite applied to a categorical column after filling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueReplacement {
    pub column: String,
    pub values: Vec<String>,
    pub replacement: String,
}

/// Per-column missing-value policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Numeric columns filled with their batch mean
    pub numeric: Vec<String>,
    /// Categorical columns and the sentinel category their gaps become
    pub sentinels: BTreeMap<String, String>,
    /// Rewrites of existing categorical values
    pub replacements: Vec<ValueReplacement>,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        let sentinels = [
            (INVESTIGATION_TYPE, "Unknown"),
            (AIRCRAFT_DAMAGE, "Unknown"),
            (AIRCRAFT_CATEGORY, "Unknown"),
            (ENGINE_TYPE, "Others"),
            (PURPOSE_OF_FLIGHT, "Unknown"),
            (WEATHER_CONDITION, "UNK"),
            (BROAD_PHASE_OF_FLIGHT, "UNKNOWN"),
        ]
        .into_iter()
        .map(|(column, sentinel)| (column.to_string(), sentinel.to_string()))
        .collect();

        Self {
            numeric: [
                TOTAL_UNINJURED,
                TOTAL_MINOR_INJURIES,
                TOTAL_SERIOUS_INJURIES,
                NUMBER_OF_ENGINES,
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            sentinels,
            replacements: vec![ValueReplacement {
                column: ENGINE_TYPE.to_string(),
                values: vec!["None".to_string(), "Unknown".to_string()],
                replacement: "Others".to_string(),
            }],
        }
    }
}

impl ImputationConfig {
    /// Sentinel configured for a column
    #[must_use]
    pub fn sentinel(&self, column: &str) -> Option<&str> {
        self.sentinels.get(column).map(String::as_str)
    }

    /// Rewrite target for a value of a column, if a replacement applies
    #[must_use]
    pub fn replacement(&self, column: &str, value: &str) -> Option<&str> {
        self.replacements
            .iter()
            .find(|r| r.column == column && r.values.iter().any(|v| v == value))
            .map(|r| r.replacement.as_str())
    }

    /// Check that no column is configured under two policies and that
    /// replacements target sentinel-filled columns
    pub fn validate(&self) -> Result<()> {
        if let Some(column) = self.numeric.iter().find(|c| self.sentinels.contains_key(*c)) {
            return Err(PipelineError::Config(format!(
                "column '{column}' is configured for both mean and sentinel imputation"
            )));
        }
        if let Some(replacement) = self
            .replacements
            .iter()
            .find(|r| !self.sentinels.contains_key(&r.column))
        {
            return Err(PipelineError::Config(format!(
                "replacement targets column '{}' which has no sentinel",
                replacement.column
            )));
        }
        Ok(())
    }
}

/// Parquet writer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum rows per row group
    pub max_row_group_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}
