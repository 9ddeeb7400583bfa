//! The preprocessing pipeline
//!
//! ```text
//! load → select → impute → decompose dates → encode → derive labels → write
//! ```
//!
//! Every stage works on one in-memory record batch. A failing stage aborts
//! the run before anything is written, so earlier outputs stay untouched.

pub mod dates;
pub mod encode;
pub mod impute;
pub mod label;
pub mod select;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::loader::load_records;
use crate::schema::feature_schema;
use crate::utils::arrow::{event_ids, project_columns};
use crate::utils::io::TableWriter;
use crate::utils::logging::log_stage_complete;

pub use dates::{DateDecomposer, parse_event_date};
pub use encode::{CategoryEncoder, CategoryMapping, CategoryMappings, EncodedBatch, UNSEEN_CODE};
pub use impute::{ImputationReport, Imputer};
pub use label::{LabelDeriver, LabelSummary, fatality_ratio};
pub use select::FeatureSelector;

/// Number of progress steps reported by [`Pipeline::run`]
pub const STAGE_COUNT: u64 = 7;

/// Tables produced by the in-memory stages
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub features: RecordBatch,
    pub labels: RecordBatch,
    pub mappings: CategoryMappings,
    pub imputation: ImputationReport,
    pub label_summary: LabelSummary,
    /// Values encoded as unseen, per column (only with persisted mappings)
    pub unseen: BTreeMap<String, usize>,
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub rows: usize,
    pub features_path: PathBuf,
    pub labels_path: PathBuf,
    pub mapping_paths: Vec<PathBuf>,
    pub imputation: ImputationReport,
    pub label_summary: LabelSummary,
    pub unseen: BTreeMap<String, usize>,
}

/// Runs the stages in order over one batch
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    /// Create a pipeline after validating the configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
        })
    }

    /// Report stage progress on a progress bar
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        progress.set_length(STAGE_COUNT);
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn advance(&self, stage: &str) {
        if let Some(pb) = &self.progress {
            pb.set_message(stage.to_string());
            pb.inc(1);
        }
    }

    /// The encoder for this run: persisted mappings when reuse is requested
    /// and available, otherwise a fresh fit
    pub fn encoder(&self) -> Result<CategoryEncoder> {
        let dir = self.config.mappings_path();
        if !self.config.reuse_mappings {
            return Ok(CategoryEncoder::fit());
        }
        if CategoryMappings::exist_in(&dir) {
            Ok(CategoryEncoder::with_mappings(CategoryMappings::load(&dir)?))
        } else {
            log::warn!(
                "No persisted mappings in {}, fitting new ones",
                dir.display()
            );
            Ok(CategoryEncoder::fit())
        }
    }

    /// Run the in-memory stages with freshly fitted mappings
    pub fn transform(&self, raw: &RecordBatch) -> Result<TransformOutput> {
        self.transform_with_encoder(raw, &CategoryEncoder::fit())
    }

    /// Run the in-memory stages with the given encoder
    pub fn transform_with_encoder(
        &self,
        raw: &RecordBatch,
        encoder: &CategoryEncoder,
    ) -> Result<TransformOutput> {
        let rows = raw.num_rows();

        let start = Instant::now();
        let selected = FeatureSelector::new(self.config.derive_timestamp_from_event_date)
            .select(raw)?;
        log_stage_complete("Selected features", rows, start.elapsed());
        self.advance("selected features");

        let start = Instant::now();
        let (imputed, imputation) = Imputer::new(self.config.imputation.clone()).impute(&selected)?;
        log_stage_complete("Imputed missing values", rows, start.elapsed());
        self.advance("imputed missing values");

        let start = Instant::now();
        let dated = DateDecomposer.decompose(&imputed)?;
        log_stage_complete("Decomposed event dates", rows, start.elapsed());
        self.advance("decomposed event dates");

        let start = Instant::now();
        let EncodedBatch {
            batch: encoded,
            mappings,
            unseen,
        } = encoder.encode(&dated)?;
        log_stage_complete("Encoded categories", rows, start.elapsed());
        self.advance("encoded categories");

        let start = Instant::now();
        let (labels, label_summary) = LabelDeriver.label_table(&encoded)?;
        let schema = feature_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let projected = project_columns(&encoded, &names)?;
        let features = RecordBatch::try_new(schema.clone(), projected.columns().to_vec())?;
        log_stage_complete("Derived labels", rows, start.elapsed());
        self.advance("derived labels");

        Ok(TransformOutput {
            features,
            labels,
            mappings,
            imputation,
            label_summary,
            unseen,
        })
    }

    /// Load, transform and write
    pub fn run(&self) -> Result<PipelineOutput> {
        let start = Instant::now();
        let config = &self.config;

        let raw = load_records(&config.input, config.delimiter)?;
        self.advance("loaded records");

        let encoder = self.encoder()?;
        let output = self.transform_with_encoder(&raw, &encoder)?;
        let features_path = config.features_path();
        let labels_path = config.labels_path();
        verify_label_keys(&output.features, &output.labels, &labels_path)?;

        let mapping_dir = config.mappings_path();
        let mapping_tables = output
            .mappings
            .iter()
            .map(|(column, mapping)| {
                Ok((
                    mapping.to_record_batch()?,
                    CategoryMappings::table_path(&mapping_dir, column),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tables: Vec<(&RecordBatch, PathBuf)> = vec![
            (&output.features, features_path.clone()),
            (&output.labels, labels_path.clone()),
        ];
        tables.extend(mapping_tables.iter().map(|(batch, path)| (batch, path.clone())));

        TableWriter::new(&config.writer).write_all(&tables)?;
        self.advance("wrote tables");

        log::info!(
            "Pipeline finished: {} incidents, {} labelled, {} undefined ratios in {:?}",
            raw.num_rows(),
            output.label_summary.defined,
            output.label_summary.undefined,
            start.elapsed()
        );

        Ok(PipelineOutput {
            rows: raw.num_rows(),
            features_path,
            labels_path,
            mapping_paths: mapping_tables.into_iter().map(|(_, path)| path).collect(),
            imputation: output.imputation,
            label_summary: output.label_summary,
            unseen: output.unseen,
        })
    }
}

/// Check that every label identifier exists in the feature table
///
/// # Errors
/// Returns a write error for `labels_path` naming the first orphan identifier
pub fn verify_label_keys(
    features: &RecordBatch,
    labels: &RecordBatch,
    labels_path: &Path,
) -> Result<()> {
    let feature_ids = event_ids(features)?;
    let known: FxHashSet<&str> = feature_ids.iter().flatten().collect();

    let label_ids = event_ids(labels)?;
    if let Some(orphan) = label_ids.iter().flatten().find(|id| !known.contains(id)) {
        return Err(PipelineError::write(
            labels_path,
            format!("label identifier '{orphan}' has no feature row"),
        ));
    }
    if label_ids.null_count() > 0 {
        return Err(PipelineError::write(
            labels_path,
            "label table contains a missing identifier",
        ));
    }
    Ok(())
}
