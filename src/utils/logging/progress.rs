//! Progress reporting for the command line
//!
//! The pipeline reports each stage through a single bar sized to the number
//! of stages; lookups and summaries use a spinner.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Default style for the stage progress bar
pub const STAGE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Create a progress bar advancing once per pipeline stage
#[must_use]
pub fn create_stage_progress_bar(stages: u64) -> ProgressBar {
    let pb = ProgressBar::new(stages);
    if let Ok(style) = ProgressStyle::default_bar().template(STAGE_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Create a spinner for operations without a known length
#[must_use]
pub fn create_spinner(message: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {elapsed_precise} {msg}") {
        pb.set_style(style);
    }

    if let Some(msg) = message {
        pb.set_message(msg.to_string());
    }

    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
