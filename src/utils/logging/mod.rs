//! Logging utilities for output and progress tracking

pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use self::log::{log_operation_complete, log_operation_start, log_stage_complete, log_warning};
pub use self::progress::{create_spinner, create_stage_progress_bar, finish_progress_bar};
