use std::collections::BTreeSet;
use std::fs;

use crate::utils::{Incident, config, run, sample_incidents, write_csv};
use arrow::array::Array;
use aviation_features::schema::{
    ENGINE_TYPE, EVENT_ID, MODEL_INPUT_COLUMNS, NUMBER_OF_ENGINES, PURPOSE_OF_FLIGHT, RATIO,
    TOTAL_MINOR_INJURIES, TOTAL_UNINJURED, feature_schema, label_schema,
};
use aviation_features::utils::arrow::{float64_column, get_column, int32_column, string_column};
use aviation_features::{CategoryMappings, Pipeline, PipelineError, read_table};

fn ids(batch: &arrow::record_batch::RecordBatch) -> BTreeSet<String> {
    string_column(batch, EVENT_ID)
        .unwrap()
        .iter()
        .flatten()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_run_writes_feature_label_and_mapping_tables() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");

    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();
    assert_eq!(result.rows, 4);
    assert_eq!(result.mapping_paths.len(), 7);
    assert!(result.mapping_paths.iter().all(|p| p.is_file()));
    assert_eq!(result.label_summary.defined, 3);
    assert_eq!(result.label_summary.undefined, 1);

    let features = read_table(&result.features_path).unwrap();
    let labels = read_table(&result.labels_path).unwrap();
    assert_eq!(features.schema().fields(), feature_schema().fields());
    assert_eq!(labels.schema().fields(), label_schema().fields());
    assert_eq!(ids(&features), ids(&labels));

    for column in MODEL_INPUT_COLUMNS {
        assert_eq!(get_column(&features, column).unwrap().null_count(), 0, "{column}");
    }

    // No staging files left behind
    let leftovers: Vec<_> = fs::read_dir(&output)
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_labels_and_imputed_values() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();

    let labels = read_table(&result.labels_path).unwrap();
    let ratio = float64_column(&labels, RATIO).unwrap();
    assert!((ratio.value(0) - 0.2).abs() < 1e-12);
    assert!(ratio.is_null(1));
    // E3: serious is filled with the mean of 1, 0 and 2
    assert!((ratio.value(2) - 1.0 / 7.0).abs() < 1e-12);
    assert_eq!(ratio.value(3), 0.0);

    let features = read_table(&result.features_path).unwrap();
    let minor = float64_column(&features, TOTAL_MINOR_INJURIES).unwrap();
    assert!((minor.value(3) - 2.0 / 3.0).abs() < 1e-12);
    assert!((result.imputation.means[TOTAL_MINOR_INJURIES] - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_engine_type_unknown_becomes_others() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let result = run(scratch.path(), &output, &sample_incidents()).unwrap();

    let mappings = CategoryMappings::load(&output.join("mappings")).unwrap();
    let engine = mappings.get(ENGINE_TYPE).unwrap();
    assert_eq!(engine.len(), 3);
    assert_eq!(engine.code("Unknown"), None);
    let others = engine.code("Others").unwrap();

    let features = read_table(&result.features_path).unwrap();
    let codes = int32_column(&features, ENGINE_TYPE).unwrap();
    assert_eq!(codes.value(2), others);
    assert_eq!(codes.value(3), others);
    assert_eq!(result.imputation.replaced[ENGINE_TYPE], 1);
}

#[test]
fn test_rerun_is_byte_identical() {
    let scratch = tempfile::tempdir().unwrap();
    let first = run(scratch.path(), &scratch.path().join("a"), &sample_incidents()).unwrap();
    let second = run(scratch.path(), &scratch.path().join("b"), &sample_incidents()).unwrap();

    assert_eq!(
        fs::read(&first.features_path).unwrap(),
        fs::read(&second.features_path).unwrap()
    );
    assert_eq!(
        fs::read(&first.labels_path).unwrap(),
        fs::read(&second.labels_path).unwrap()
    );
    for (a, b) in first.mapping_paths.iter().zip(&second.mapping_paths) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }
}

#[test]
fn test_invalid_date_aborts_without_output() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");

    let mut incidents = sample_incidents();
    let mut bad = Incident::new("E5");
    bad.event_date = "13/40/2001".to_string();
    incidents.push(bad);

    match run(scratch.path(), &output, &incidents).unwrap_err() {
        PipelineError::Parse {
            column, event_id, ..
        } => {
            assert_eq!(column, "Event_Date");
            assert_eq!(event_id, "E5");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_failed_run_keeps_previous_output() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let good = run(scratch.path(), &output, &sample_incidents()).unwrap();
    let before = fs::read(&good.features_path).unwrap();

    let mut incidents = sample_incidents();
    incidents[0].event_date = "13/40/2001".to_string();
    assert!(run(scratch.path(), &output, &incidents).is_err());
    assert_eq!(fs::read(&good.features_path).unwrap(), before);
}

#[test]
fn test_entirely_missing_numeric_column_is_imputation_error() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let incidents: Vec<Incident> = sample_incidents()
        .into_iter()
        .map(|mut i| {
            i.engines = String::new();
            i
        })
        .collect();

    match run(scratch.path(), &output, &incidents).unwrap_err() {
        PipelineError::Imputation { column, .. } => assert_eq!(column, NUMBER_OF_ENGINES),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_header_only_input_is_imputation_error() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");

    match run(scratch.path(), &output, &[]).unwrap_err() {
        PipelineError::Imputation { column, .. } => assert_eq!(column, TOTAL_UNINJURED),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_duplicate_identifier_is_schema_error() {
    let scratch = tempfile::tempdir().unwrap();
    let mut incidents = sample_incidents();
    incidents.push(Incident::new("E1"));
    let err = run(scratch.path(), &scratch.path().join("out"), &incidents).unwrap_err();
    assert!(matches!(err, PipelineError::Schema(_)));
}

#[test]
fn test_windows_1252_input() {
    let scratch = tempfile::tempdir().unwrap();
    let mut incident = Incident::new("E1").injuries("1", "0", "0", "1");
    incident.purpose = "Aerial Application".to_string();
    let text = crate::utils::csv_text(&[incident, Incident::new("E2")]);

    // Replace the ASCII 'e' of "Aerial" with a single 0xE9 byte (é in cp1252).
    let mut bytes = text.into_bytes();
    let at = bytes
        .windows(6)
        .position(|w| w == b"Aerial")
        .unwrap();
    bytes[at + 1] = 0xE9;
    let input = scratch.path().join("incidents.csv");
    fs::write(&input, bytes).unwrap();

    let output = scratch.path().join("out");
    Pipeline::new(config(&input, &output)).unwrap().run().unwrap();

    let mappings = CategoryMappings::load(&output.join("mappings")).unwrap();
    let purpose = mappings.get(PURPOSE_OF_FLIGHT).unwrap();
    assert!(purpose.code("A\u{e9}rial Application").is_some());
}

#[test]
fn test_transform_without_io() {
    let scratch = tempfile::tempdir().unwrap();
    let input = write_csv(scratch.path(), &sample_incidents());
    let raw = aviation_features::load_records(&input, b',').unwrap();

    let pipeline = Pipeline::new(config(&input, &scratch.path().join("out"))).unwrap();
    let output = pipeline.transform(&raw).unwrap();
    assert_eq!(output.features.num_rows(), 4);
    assert_eq!(output.labels.num_rows(), 4);
    assert_eq!(output.mappings.len(), 7);
    assert!(output.unseen.is_empty());
    assert!(!scratch.path().join("out").exists());
}
