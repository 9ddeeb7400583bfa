//! Column names and Arrow schemas for the raw, feature, label and mapping tables.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};

pub mod validation;

pub use validation::{require_columns, validate_identifiers};

/// Identifier column, the join key between every output table
pub const EVENT_ID: &str = "Event_Id";
/// Raw event date, `M/D/YYYY`
pub const EVENT_DATE: &str = "Event_Date";
/// Event timestamp used for feature-store bookkeeping
pub const EVENT_TIMESTAMP: &str = "event_timestamp";

pub const INVESTIGATION_TYPE: &str = "Investigation_Type";
pub const AIRCRAFT_DAMAGE: &str = "Aircraft_damage";
pub const AIRCRAFT_CATEGORY: &str = "Aircraft_Category";
pub const NUMBER_OF_ENGINES: &str = "Number_of_Engines";
pub const ENGINE_TYPE: &str = "Engine_Type";
pub const PURPOSE_OF_FLIGHT: &str = "Purpose_of_flight";
pub const TOTAL_FATAL_INJURIES: &str = "Total_Fatal_Injuries";
pub const TOTAL_SERIOUS_INJURIES: &str = "Total_Serious_Injuries";
pub const TOTAL_MINOR_INJURIES: &str = "Total_Minor_Injuries";
pub const TOTAL_UNINJURED: &str = "Total_Uninjured";
pub const WEATHER_CONDITION: &str = "Weather_Condition";
pub const BROAD_PHASE_OF_FLIGHT: &str = "Broad_phase_of_flight";

pub const YEAR: &str = "year";
pub const MONTH: &str = "month";
pub const DAY: &str = "day";

/// Fatality ratio label
pub const RATIO: &str = "ratio";

/// Columns of the mapping side-tables
pub const MAPPING_VALUE: &str = "value";
pub const MAPPING_CODE: &str = "code";

/// The twelve modeling columns, in raw order
pub const MODELING_COLUMNS: [&str; 12] = [
    INVESTIGATION_TYPE,
    AIRCRAFT_DAMAGE,
    AIRCRAFT_CATEGORY,
    NUMBER_OF_ENGINES,
    ENGINE_TYPE,
    PURPOSE_OF_FLIGHT,
    TOTAL_FATAL_INJURIES,
    TOTAL_SERIOUS_INJURIES,
    TOTAL_MINOR_INJURIES,
    TOTAL_UNINJURED,
    WEATHER_CONDITION,
    BROAD_PHASE_OF_FLIGHT,
];

/// Categorical modeling columns
pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    INVESTIGATION_TYPE,
    AIRCRAFT_DAMAGE,
    AIRCRAFT_CATEGORY,
    ENGINE_TYPE,
    PURPOSE_OF_FLIGHT,
    WEATHER_CONDITION,
    BROAD_PHASE_OF_FLIGHT,
];

/// Numeric modeling columns
pub const NUMERIC_COLUMNS: [&str; 5] = [
    NUMBER_OF_ENGINES,
    TOTAL_FATAL_INJURIES,
    TOTAL_SERIOUS_INJURIES,
    TOTAL_MINOR_INJURIES,
    TOTAL_UNINJURED,
];

/// Columns the regression model consumes. The fatal count is the label
/// numerator, not an input.
pub const MODEL_INPUT_COLUMNS: [&str; 14] = [
    INVESTIGATION_TYPE,
    AIRCRAFT_DAMAGE,
    AIRCRAFT_CATEGORY,
    NUMBER_OF_ENGINES,
    ENGINE_TYPE,
    PURPOSE_OF_FLIGHT,
    TOTAL_SERIOUS_INJURIES,
    TOTAL_MINOR_INJURIES,
    TOTAL_UNINJURED,
    WEATHER_CONDITION,
    BROAD_PHASE_OF_FLIGHT,
    YEAR,
    MONTH,
    DAY,
];

/// Columns the selector keeps from the raw table, in output order
#[must_use]
pub fn selected_columns() -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(MODELING_COLUMNS.len() + 3);
    columns.push(EVENT_ID);
    columns.extend(MODELING_COLUMNS);
    columns.push(EVENT_DATE);
    columns.push(EVENT_TIMESTAMP);
    columns
}

/// Model inputs sorted by column name, the column order of the design matrix
#[must_use]
pub fn model_input_order() -> Vec<&'static str> {
    let mut columns = MODEL_INPUT_COLUMNS.to_vec();
    columns.sort_unstable();
    columns
}

/// Returns true for the categorical modeling columns
#[must_use]
pub fn is_categorical(column: &str) -> bool {
    CATEGORICAL_COLUMNS.contains(&column)
}

/// Returns true for the numeric modeling columns
#[must_use]
pub fn is_numeric(column: &str) -> bool {
    NUMERIC_COLUMNS.contains(&column)
}

/// Arrow type of the event timestamp column
#[must_use]
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Schema of the selected table after type conversion, before imputation
#[must_use]
pub fn selected_schema() -> SchemaRef {
    let mut fields = Vec::with_capacity(15);
    fields.push(Field::new(EVENT_ID, DataType::Utf8, false));
    for column in MODELING_COLUMNS {
        let data_type = if is_numeric(column) {
            DataType::Float64
        } else {
            DataType::Utf8
        };
        fields.push(Field::new(column, data_type, true));
    }
    fields.push(Field::new(EVENT_DATE, DataType::Utf8, true));
    fields.push(Field::new(EVENT_TIMESTAMP, timestamp_type(), false));
    Arc::new(Schema::new(fields))
}

/// Schema of the persisted feature table
#[must_use]
pub fn feature_schema() -> SchemaRef {
    let mut fields = Vec::with_capacity(17);
    fields.push(Field::new(EVENT_ID, DataType::Utf8, false));
    for column in MODELING_COLUMNS {
        let field = if is_categorical(column) {
            Field::new(column, DataType::Int32, false)
        } else {
            // The fatal count is not imputed, so it may stay null.
            Field::new(column, DataType::Float64, column == TOTAL_FATAL_INJURIES)
        };
        fields.push(field);
    }
    fields.push(Field::new(EVENT_TIMESTAMP, timestamp_type(), false));
    fields.push(Field::new(YEAR, DataType::Int32, false));
    fields.push(Field::new(MONTH, DataType::Int32, false));
    fields.push(Field::new(DAY, DataType::Int32, false));
    Arc::new(Schema::new(fields))
}

/// Schema of the persisted label table
#[must_use]
pub fn label_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(EVENT_ID, DataType::Utf8, false),
        Field::new(RATIO, DataType::Float64, true),
        Field::new(EVENT_TIMESTAMP, timestamp_type(), false),
    ]))
}

/// Schema of a single category mapping side-table
#[must_use]
pub fn mapping_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(MAPPING_VALUE, DataType::Utf8, false),
        Field::new(MAPPING_CODE, DataType::Int32, false),
    ]))
}
