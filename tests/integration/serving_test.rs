use std::collections::BTreeMap;

use crate::utils::{run, sample_incidents};
use aviation_features::pipeline::select::parse_timestamp;
use aviation_features::schema::{ENGINE_TYPE, MODEL_INPUT_COLUMNS, WEATHER_CONDITION};
use aviation_features::{
    FeatureTable, ImputationConfig, RegressionMetrics, ServingEncoder, TrainingSet, read_table,
};

#[test]
fn test_lookup_by_event_id() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();

    let table = FeatureTable::open(&result.features_path).unwrap();
    assert_eq!(table.len(), 4);

    let row = table.get("E1").unwrap().unwrap();
    assert_eq!((row.year, row.month, row.day), (2001, 3, 15));
    assert_eq!(row.total_fatal_injuries, Some(2.0));
    assert_eq!(row.event_timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    assert_eq!(row.model_inputs().len(), MODEL_INPUT_COLUMNS.len());

    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json["Event_Id"], "E1");
    assert_eq!(json["year"], 2001);

    assert!(table.get("missing").unwrap().is_none());
}

#[test]
fn test_serving_encoder_matches_training_codes() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();

    let table = FeatureTable::open(&result.features_path).unwrap();
    let encoder = ServingEncoder::load(&output.join("mappings"), ImputationConfig::default())
        .unwrap();

    let e1 = table.get("E1").unwrap().unwrap();
    assert_eq!(
        encoder.encode(WEATHER_CONDITION, Some("VMC")).unwrap(),
        e1.weather_condition
    );

    // E3 had no engine type or weather; serving fills them the same way
    let e3 = table.get("E3").unwrap().unwrap();
    let record = BTreeMap::from([("Investigation_Type".to_string(), "Accident".to_string())]);
    let codes = encoder.encode_record(&record).unwrap();
    assert_eq!(codes[ENGINE_TYPE], e3.engine_type);
    assert_eq!(codes[WEATHER_CONDITION], e3.weather_condition);
    assert_eq!(encoder.encode(ENGINE_TYPE, Some("Unknown")).unwrap(), e3.engine_type);
}

#[test]
fn test_training_set_excludes_undefined_ratios() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();

    let features = read_table(&result.features_path).unwrap();
    let labels = read_table(&result.labels_path).unwrap();
    let set = TrainingSet::assemble(&features, &labels).unwrap();

    assert_eq!(set.len(), 3);
    assert_eq!(set.event_ids, vec!["E1", "E3", "E4"]);
    assert!(set.rows.iter().all(|row| row.len() == MODEL_INPUT_COLUMNS.len()));

    let table = FeatureTable::from_batch(features).unwrap();
    let e1 = table.get("E1").unwrap().unwrap();
    assert_eq!(set.rows[0], e1.model_inputs());

    let metrics = RegressionMetrics::compute(&set.targets, &set.targets).unwrap();
    assert_eq!(metrics.mse, 0.0);
    assert_eq!(metrics.r2, Some(1.0));
}

#[test]
fn test_training_cutoff_holds_out_later_incidents() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let mut incidents = sample_incidents();
    incidents[2].timestamp = "2025-02-01 08:30:00".to_string();
    let result = run(scratch.path(), &output, &incidents).unwrap();

    let features = read_table(&result.features_path).unwrap();
    let labels = read_table(&result.labels_path).unwrap();
    let micros = parse_timestamp("2024-06-01").unwrap();
    let cutoff = chrono::DateTime::from_timestamp_micros(micros).unwrap();

    let set = TrainingSet::assemble_until(&features, &labels, Some(cutoff)).unwrap();
    assert_eq!(set.event_ids, vec!["E1", "E4"]);
    assert_eq!(set.held_out, vec!["E3"]);
}
