//! IO utilities for reading and writing Parquet tables

pub mod parquet;

// Re-export commonly used functions for convenience
pub use self::parquet::{StagedTable, TableWriter, read_parquet, read_table};
