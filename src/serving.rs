//! Reading the written tables back for inference
//!
//! [`FeatureTable`] is a keyed lookup over the feature table. [`ServingEncoder`]
//! turns a raw categorical record into the codes the training run produced.

use std::collections::BTreeMap;
use std::path::Path;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::ImputationConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::encode::CategoryMappings;
use crate::schema::{self, CATEGORICAL_COLUMNS, feature_schema, model_input_order};
use crate::utils::arrow::{event_ids, float64_column, int32_column, timestamp_column};
use crate::utils::io::read_table;

/// One row of the feature table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    #[serde(rename = "Event_Id")]
    pub event_id: String,
    #[serde(rename = "Investigation_Type")]
    pub investigation_type: i32,
    #[serde(rename = "Aircraft_damage")]
    pub aircraft_damage: i32,
    #[serde(rename = "Aircraft_Category")]
    pub aircraft_category: i32,
    #[serde(rename = "Number_of_Engines")]
    pub number_of_engines: f64,
    #[serde(rename = "Engine_Type")]
    pub engine_type: i32,
    #[serde(rename = "Purpose_of_flight")]
    pub purpose_of_flight: i32,
    #[serde(rename = "Total_Fatal_Injuries")]
    pub total_fatal_injuries: Option<f64>,
    #[serde(rename = "Total_Serious_Injuries")]
    pub total_serious_injuries: f64,
    #[serde(rename = "Total_Minor_Injuries")]
    pub total_minor_injuries: f64,
    #[serde(rename = "Total_Uninjured")]
    pub total_uninjured: f64,
    #[serde(rename = "Weather_Condition")]
    pub weather_condition: i32,
    #[serde(rename = "Broad_phase_of_flight")]
    pub broad_phase_of_flight: i32,
    pub event_timestamp: DateTime<Utc>,
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

impl FeatureRow {
    /// Value of a model input column
    #[must_use]
    pub fn input(&self, column: &str) -> Option<f64> {
        let value = match column {
            schema::INVESTIGATION_TYPE => f64::from(self.investigation_type),
            schema::AIRCRAFT_DAMAGE => f64::from(self.aircraft_damage),
            schema::AIRCRAFT_CATEGORY => f64::from(self.aircraft_category),
            schema::NUMBER_OF_ENGINES => self.number_of_engines,
            schema::ENGINE_TYPE => f64::from(self.engine_type),
            schema::PURPOSE_OF_FLIGHT => f64::from(self.purpose_of_flight),
            schema::TOTAL_SERIOUS_INJURIES => self.total_serious_injuries,
            schema::TOTAL_MINOR_INJURIES => self.total_minor_injuries,
            schema::TOTAL_UNINJURED => self.total_uninjured,
            schema::WEATHER_CONDITION => f64::from(self.weather_condition),
            schema::BROAD_PHASE_OF_FLIGHT => f64::from(self.broad_phase_of_flight),
            schema::YEAR => f64::from(self.year),
            schema::MONTH => f64::from(self.month),
            schema::DAY => f64::from(self.day),
            _ => return None,
        };
        Some(value)
    }

    /// Model inputs in design-matrix order
    #[must_use]
    pub fn model_inputs(&self) -> Vec<f64> {
        model_input_order()
            .into_iter()
            .filter_map(|column| self.input(column))
            .collect()
    }
}

/// The feature table indexed by `Event_Id`
#[derive(Debug, Clone)]
pub struct FeatureTable {
    batch: RecordBatch,
    index: FxHashMap<String, usize>,
}

impl FeatureTable {
    /// Load a written feature table
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_batch(read_table(path)?)
    }

    /// Index an in-memory feature table
    ///
    /// # Errors
    /// Returns a schema error if the batch does not have the feature layout
    /// or an identifier repeats
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let expected = feature_schema();
        if batch.schema().fields() != expected.fields() {
            return Err(PipelineError::Schema(
                "table does not have the feature table layout".to_string(),
            ));
        }

        let ids = event_ids(&batch)?;
        schema::validate_identifiers(ids)?;
        let index = ids
            .iter()
            .enumerate()
            .filter_map(|(row, id)| id.map(|id| (id.to_string(), row)))
            .collect();

        Ok(Self { batch, index })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Row of an incident, `None` if the identifier is unknown
    pub fn get(&self, event_id: &str) -> Result<Option<FeatureRow>> {
        match self.index.get(event_id) {
            Some(&row) => self.row(row).map(Some),
            None => Ok(None),
        }
    }

    fn row(&self, row: usize) -> Result<FeatureRow> {
        let b = &self.batch;
        let code = |column: &str| int32_column(b, column).map(|a| a.value(row));
        let count = |column: &str| float64_column(b, column).map(|a| a.value(row));

        let fatal = float64_column(b, schema::TOTAL_FATAL_INJURIES)?;
        let micros = timestamp_column(b, schema::EVENT_TIMESTAMP)?.value(row);
        let event_id = event_ids(b)?.value(row).to_string();
        let event_timestamp = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            PipelineError::parse(
                schema::EVENT_TIMESTAMP,
                &event_id,
                format!("timestamp {micros} is out of range"),
            )
        })?;

        Ok(FeatureRow {
            investigation_type: code(schema::INVESTIGATION_TYPE)?,
            aircraft_damage: code(schema::AIRCRAFT_DAMAGE)?,
            aircraft_category: code(schema::AIRCRAFT_CATEGORY)?,
            number_of_engines: count(schema::NUMBER_OF_ENGINES)?,
            engine_type: code(schema::ENGINE_TYPE)?,
            purpose_of_flight: code(schema::PURPOSE_OF_FLIGHT)?,
            total_fatal_injuries: (!fatal.is_null(row)).then(|| fatal.value(row)),
            total_serious_injuries: count(schema::TOTAL_SERIOUS_INJURIES)?,
            total_minor_injuries: count(schema::TOTAL_MINOR_INJURIES)?,
            total_uninjured: count(schema::TOTAL_UNINJURED)?,
            weather_condition: code(schema::WEATHER_CONDITION)?,
            broad_phase_of_flight: code(schema::BROAD_PHASE_OF_FLIGHT)?,
            event_timestamp,
            year: code(schema::YEAR)?,
            month: code(schema::MONTH)?,
            day: code(schema::DAY)?,
            event_id,
        })
    }
}

/// Encodes raw categorical values exactly like the training run
#[derive(Debug, Clone)]
pub struct ServingEncoder {
    mappings: CategoryMappings,
    imputation: ImputationConfig,
}

impl ServingEncoder {
    #[must_use]
    pub const fn new(mappings: CategoryMappings, imputation: ImputationConfig) -> Self {
        Self {
            mappings,
            imputation,
        }
    }

    /// Load the mappings persisted in a mapping directory
    pub fn load(dir: &Path, imputation: ImputationConfig) -> Result<Self> {
        Ok(Self::new(CategoryMappings::load(dir)?, imputation))
    }

    /// Code of one raw value; blank or missing values take the column's sentinel
    ///
    /// Replacements apply to given values only, as in [`crate::Imputer`].
    pub fn encode(&self, column: &str, value: Option<&str>) -> Result<i32> {
        let mapping = self
            .mappings
            .get(column)
            .ok_or_else(|| PipelineError::encoding(column, "no persisted mapping for column"))?;
        let sentinel = self
            .imputation
            .sentinel(column)
            .ok_or_else(|| PipelineError::imputation(column, "no sentinel category configured"))?;

        let value = match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(given) => self.imputation.replacement(column, given).unwrap_or(given),
            None => sentinel,
        };
        Ok(mapping.encode(value))
    }

    /// Codes for every categorical column of a raw record keyed by column name
    pub fn encode_record(
        &self,
        record: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<&'static str, i32>> {
        CATEGORICAL_COLUMNS
            .iter()
            .map(|&column| {
                let code = self.encode(column, record.get(column).map(String::as_str))?;
                Ok((column, code))
            })
            .collect()
    }
}
