//! A Rust library for turning the aviation incident export into model-ready
//! Parquet tables: a feature table, a fatality-ratio label table and one
//! category mapping table per categorical column.

pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod serving;
pub mod training;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ImputationConfig, PipelineConfig, ValueReplacement, WriterConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineOutput, TransformOutput};

// Stages
pub use loader::{load_records, load_records_from_bytes};
pub use pipeline::{
    CategoryEncoder, CategoryMapping, CategoryMappings, DateDecomposer, FeatureSelector,
    ImputationReport, Imputer, LabelDeriver, LabelSummary, UNSEEN_CODE,
};

// Consumers of the written tables
pub use serving::{FeatureRow, FeatureTable, ServingEncoder};
pub use training::{DEFAULT_TEST_FRACTION, RegressionMetrics, TrainingSet};

// Arrow types
pub use arrow::record_batch::RecordBatch;

// Utility functions
pub use utils::io::{TableWriter, read_parquet, read_table};
