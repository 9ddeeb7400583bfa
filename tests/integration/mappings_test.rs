use crate::utils::{Incident, config, run, sample_incidents, write_csv};
use aviation_features::schema::{CATEGORICAL_COLUMNS, WEATHER_CONDITION};
use aviation_features::utils::arrow::int32_column;
use aviation_features::{CategoryMappings, Pipeline, UNSEEN_CODE, read_table};

#[test]
fn test_persisted_mappings_reload_to_same_codes() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let input = write_csv(scratch.path(), &sample_incidents());
    let pipeline = Pipeline::new(config(&input, &output)).unwrap();

    let raw = aviation_features::load_records(&input, b',').unwrap();
    let fitted = pipeline.transform(&raw).unwrap().mappings;
    pipeline.run().unwrap();

    let reloaded = CategoryMappings::load(&output.join("mappings")).unwrap();
    assert_eq!(reloaded, fitted);
    assert_eq!(reloaded.len(), CATEGORICAL_COLUMNS.len());

    let weather = reloaded.get(WEATHER_CONDITION).unwrap();
    assert_eq!(weather.code("IMC"), Some(0));
    assert_eq!(weather.code("UNK"), Some(1));
    assert_eq!(weather.code("VMC"), Some(2));
}

#[test]
fn test_reuse_mappings_marks_unseen_values() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    run(scratch.path(), &output, &sample_incidents()).unwrap();
    let before = CategoryMappings::load(&output.join("mappings")).unwrap();

    let mut foggy = Incident::new("F1").injuries("0", "0", "1", "2");
    foggy.weather = "Fog".to_string();
    let clear = Incident::new("F2");
    let input = write_csv(scratch.path(), &[foggy, clear]);

    let mut reuse = config(&input, &output);
    reuse.reuse_mappings = true;
    let result = Pipeline::new(reuse).unwrap().run().unwrap();
    assert_eq!(result.unseen[WEATHER_CONDITION], 1);

    let features = read_table(&result.features_path).unwrap();
    let weather = int32_column(&features, WEATHER_CONDITION).unwrap();
    assert_eq!(weather.value(0), UNSEEN_CODE);
    assert_eq!(
        weather.value(1),
        before.get(WEATHER_CONDITION).unwrap().encode("VMC")
    );

    // The mapping tables are rewritten unchanged
    let after = CategoryMappings::load(&output.join("mappings")).unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_reuse_without_persisted_mappings_fits_new_ones() {
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("fresh");
    let input = write_csv(scratch.path(), &sample_incidents());

    let mut reuse = config(&input, &output);
    reuse.reuse_mappings = true;
    let result = Pipeline::new(reuse).unwrap().run().unwrap();
    assert!(result.unseen.is_empty());
    assert!(CategoryMappings::exist_in(&output.join("mappings")));
}
