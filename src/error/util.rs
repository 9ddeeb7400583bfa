//! Utility functions for error handling
//!
//! Filesystem helpers that turn bare IO failures into errors carrying the
//! path and the reason the file was needed.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(PipelineError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found, needed for: {purpose}"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => {
                "permission denied - check file permissions".to_string()
            }
            _ => format!("failed to open file for: {purpose}"),
        };
        PipelineError::io(path, io::Error::new(e.kind(), format!("{context}: {e}")))
    })
}

/// Read a whole file into memory with rich error information
pub fn safe_read_bytes(path: &Path, purpose: &str) -> Result<Vec<u8>> {
    let mut file = safe_open_file(path, purpose)?;
    let mut content = Vec::new();
    io::Read::read_to_end(&mut file, &mut content).map_err(|e| PipelineError::io(path, e))?;
    Ok(content)
}

/// Check that a directory exists, creating it when `create` is set
pub fn validate_directory(path: &Path, purpose: &str, create: bool) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    if path.exists() {
        return Err(PipelineError::io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory, expected one for: {purpose}"),
            ),
        ));
    }

    if create {
        fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))
    } else {
        Err(PipelineError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found, needed for: {purpose}"),
            ),
        ))
    }
}
