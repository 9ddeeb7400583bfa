//! Error handling for the preprocessing pipeline.
//!
//! Every stage reports faults through [`PipelineError`]. A fault aborts the
//! whole run; the variants carry the column, row identifier or path needed
//! to find the offending input.

pub mod util;

use std::io;
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the preprocessing pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Required columns are missing, or the identifier column is invalid
    #[error("Schema error: {0}")]
    Schema(String),

    /// A numeric column has no value to compute a mean from, or a column
    /// still contains missing values after imputation
    #[error("Imputation error in column '{column}': {message}")]
    Imputation { column: String, message: String },

    /// A cell could not be parsed into its declared type
    #[error("Parse error in column '{column}' for event '{event_id}': {message}")]
    Parse {
        column: String,
        event_id: String,
        message: String,
    },

    /// A categorical column violates the encoder's invariants
    #[error("Encoding error in column '{column}': {message}")]
    Encoding { column: String, message: String },

    /// Output tables could not be staged or committed
    #[error("Write error for {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    /// Error opening or reading a file
    #[error("IO error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error reading the delimited input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error building or transforming Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error encoding or decoding Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error converting between Arrow batches and Rust records
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Create a parse error for a cell
    pub fn parse(column: &str, event_id: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            column: column.to_string(),
            event_id: event_id.to_string(),
            message: message.into(),
        }
    }

    /// Create an imputation error for a column
    pub fn imputation(column: &str, message: impl Into<String>) -> Self {
        Self::Imputation {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Create an encoding error for a column
    pub fn encoding(column: &str, message: impl Into<String>) -> Self {
        Self::Encoding {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Create a write error for an output path
    pub fn write(path: &Path, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Wrap an IO error together with the path it concerns
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<serde_arrow::Error> for PipelineError {
    fn from(error: serde_arrow::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
