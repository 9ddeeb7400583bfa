//! Arrow data handling utilities
//!
//! Column lookup, typed extraction and column replacement on record batches.

pub mod array_utils;
pub mod extractors;

// Re-export commonly used functions for convenience
pub use array_utils::{
    append_columns, downcast_array, drop_column, get_column, project_columns, replace_column,
};
pub use extractors::{event_ids, float64_column, int32_column, string_column, timestamp_column};
