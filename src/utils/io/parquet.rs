//! Parquet file operations
//!
//! Reading Parquet files into record batches, and the table writer that
//! commits a run's output tables atomically.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};

use crate::config::WriterConfig;
use crate::error::util::{safe_open_file, validate_directory};
use crate::error::{PipelineError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Read a parquet file into Arrow record batches
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path, "reading parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_operation_complete(
        "read",
        path,
        batches.iter().map(RecordBatch::num_rows).sum(),
        Some(start.elapsed()),
    );
    Ok(batches)
}

/// Read a parquet file into a single record batch
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    let file = safe_open_file(path, "reading parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// A table written to a temporary file, waiting to be moved into place
#[derive(Debug)]
pub struct StagedTable {
    temp: PathBuf,
    target: PathBuf,
    rows: usize,
}

impl StagedTable {
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.temp) {
            log::debug!("Could not remove staged file {}: {e}", self.temp.display());
        }
    }
}

/// Writes output tables so that a failed run never replaces existing output
///
/// Every table is first written and synced to a hidden file next to its
/// target. Only when all tables of a run are staged are they renamed into
/// place, with the previous files kept aside until every rename succeeded.
/// On failure the staged files are removed and the previous files restored.
#[derive(Debug, Clone)]
pub struct TableWriter {
    properties: WriterProperties,
}

impl TableWriter {
    #[must_use]
    pub fn new(config: &WriterConfig) -> Self {
        // Fixed properties: identical batches give byte-identical files.
        let properties = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_1_0)
            .set_compression(Compression::SNAPPY)
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .set_max_row_group_size(config.max_row_group_size)
            .build();
        Self { properties }
    }

    /// Temporary path used while staging a target
    #[must_use]
    pub fn staging_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map_or_else(|| "table".into(), |n| n.to_string_lossy().into_owned());
        target.with_file_name(format!(".{name}.tmp"))
    }

    /// Write a batch to the staging path of `target`
    pub fn stage(&self, batch: &RecordBatch, target: &Path) -> Result<StagedTable> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            validate_directory(parent, "writing output tables", true)?;
        }

        let temp = Self::staging_path(target);
        let staged = StagedTable {
            temp,
            target: target.to_path_buf(),
            rows: batch.num_rows(),
        };

        if let Err(e) = self.write_file(batch, &staged.temp) {
            staged.discard();
            return Err(e);
        }
        Ok(staged)
    }

    fn write_file(&self, batch: &RecordBatch, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.properties.clone()))?;
        writer.write(batch)?;
        let file = writer.into_inner()?;
        file.sync_all().map_err(|e| PipelineError::io(path, e))
    }

    /// Hidden path an existing target is moved to while a commit is in progress
    #[must_use]
    pub fn backup_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map_or_else(|| "table".into(), |n| n.to_string_lossy().into_owned());
        target.with_file_name(format!(".{name}.bak"))
    }

    /// Move staged tables into place
    ///
    /// Existing targets are moved aside first. If any table cannot be moved
    /// into place, every table committed so far is rolled back, so either all
    /// targets hold the new tables or all hold what they held before.
    ///
    /// # Errors
    /// Returns a write error if a rename fails; staged files not yet moved are removed
    pub fn commit(staged: Vec<StagedTable>) -> Result<Vec<PathBuf>> {
        let mut committed: Vec<(StagedTable, Option<PathBuf>)> = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();

        while let Some(table) = pending.next() {
            match Self::swap_in(&table) {
                Ok(backup) => committed.push((table, backup)),
                Err(e) => {
                    log_warning("Rolling back committed tables", Some(&table.target));
                    table.discard();
                    pending.for_each(|t| t.discard());
                    committed.iter().rev().for_each(|(t, backup)| {
                        Self::roll_back(&t.target, backup.as_deref());
                    });
                    return Err(e);
                }
            }
        }

        let mut directories: Vec<&Path> = committed
            .iter()
            .filter_map(|(t, _)| t.target.parent())
            .collect();
        directories.sort_unstable();
        directories.dedup();
        for dir in directories {
            if let Err(e) = sync_directory(dir) {
                log_warning(&format!("Could not sync directory: {e}"), Some(dir));
            }
        }

        Ok(committed
            .into_iter()
            .map(|(table, backup)| {
                if let Some(backup) = backup {
                    if let Err(e) = fs::remove_file(&backup) {
                        log::debug!("Could not remove backup {}: {e}", backup.display());
                    }
                }
                log_operation_complete("wrote", &table.target, table.rows, None);
                table.target
            })
            .collect())
    }

    /// Move an existing target aside and the staged file into its place
    fn swap_in(table: &StagedTable) -> Result<Option<PathBuf>> {
        let backup = if table.target.is_file() {
            let backup = Self::backup_path(&table.target);
            fs::rename(&table.target, &backup).map_err(|e| {
                PipelineError::write(
                    &table.target,
                    format!("failed to move existing table aside: {e}"),
                )
            })?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&table.temp, &table.target) {
            Self::roll_back(&table.target, backup.as_deref());
            return Err(PipelineError::write(
                &table.target,
                format!("failed to move staged table into place: {e}"),
            ));
        }
        Ok(backup)
    }

    /// Restore a target to its state before the commit
    fn roll_back(target: &Path, backup: Option<&Path>) {
        let restored = match backup {
            Some(backup) => fs::rename(backup, target),
            None if target.is_file() => fs::remove_file(target),
            None => Ok(()),
        };
        if let Err(e) = restored {
            log::error!("Could not restore {}: {e}", target.display());
        }
    }

    /// Stage every table, then commit them together
    ///
    /// If any table fails to stage, nothing is committed and the tables
    /// already staged are removed.
    pub fn write_all(&self, tables: &[(&RecordBatch, PathBuf)]) -> Result<Vec<PathBuf>> {
        let mut staged = Vec::with_capacity(tables.len());

        for (batch, target) in tables {
            match self.stage(batch, target) {
                Ok(table) => staged.push(table),
                Err(e) => {
                    log_warning("Aborting write, discarding staged tables", Some(target));
                    staged.iter().for_each(StagedTable::discard);
                    return Err(PipelineError::write(target, e.to_string()));
                }
            }
        }

        Self::commit(staged)
    }
}

/// Flush directory entries so completed renames survive a crash
#[cfg(unix)]
pub fn sync_directory(dir: &Path) -> Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| PipelineError::io(dir, e))
}

/// Directory handles cannot be synced on this platform
#[cfg(not(unix))]
pub fn sync_directory(_dir: &Path) -> Result<()> {
    Ok(())
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new(&WriterConfig::default())
    }
}
