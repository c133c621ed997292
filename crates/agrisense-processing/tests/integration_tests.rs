//! Integration tests for training-table preparation.
//!
//! These tests load the fixture tables from disk and verify end-to-end
//! behavior of loading, cleaning and feature engineering.

use agrisense_processing::{
    DatasetPreparer, PreparationConfig, ProcessingError, RawRecord, TargetValues, Task,
    engineer_features, load_csv,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(filename: &str) -> DataFrame {
    load_csv(fixtures_path().join(filename)).expect("Failed to read fixture CSV")
}

// ============================================================================
// Agriculture table
// ============================================================================

#[test]
fn test_crop_health_preparation() {
    let df = load_fixture("agriculture_sample.csv");
    assert_eq!(df.height(), 120);

    let prepared = DatasetPreparer::default()
        .prepare(Task::CropHealth, &df)
        .unwrap();

    // one row has no health label
    assert_eq!(prepared.n_rows(), 119);
    assert_eq!(prepared.n_features(), 26);
    assert!(prepared.rows.iter().flatten().all(|v| v.is_finite()));
    assert!(matches!(prepared.target, TargetValues::Continuous(_)));
}

#[test]
fn test_yield_outlier_is_filtered() {
    let df = load_fixture("agriculture_sample.csv");

    let filtered = DatasetPreparer::default()
        .prepare(Task::YieldPrediction, &df)
        .unwrap();
    let unfiltered = DatasetPreparer::new(
        PreparationConfig::builder()
            .filter_target_outliers(Task::YieldPrediction, false)
            .build()
            .unwrap(),
    )
    .prepare(Task::YieldPrediction, &df)
    .unwrap();

    assert_eq!(unfiltered.n_rows(), 120);
    assert!(filtered.n_rows() < unfiltered.n_rows());
    let TargetValues::Continuous(targets) = &filtered.target else {
        panic!("yield target should be continuous");
    };
    assert!(targets.iter().all(|y| *y < 25.0));
}

#[test]
fn test_training_rows_match_inference_features() {
    let df = load_fixture("agriculture_sample.csv");
    let prepared = DatasetPreparer::default()
        .prepare(Task::YieldPrediction, &df)
        .unwrap();

    let first = df.slice(0, 1);
    let mut record = RawRecord::new();
    for column in first.get_columns() {
        let series = column.as_materialized_series();
        if let Ok(value) = series.cast(&DataType::Float64)
            && let Some(v) = value.f64().unwrap().get(0)
        {
            record.insert(column.name().as_str(), v);
        }
    }

    let inference = engineer_features(Task::YieldPrediction, &record, None);
    assert_eq!(prepared.rows[0], inference.values().to_vec());
}

// ============================================================================
// Fertilizer table
// ============================================================================

#[test]
fn test_fertilizer_preparation() {
    let df = load_fixture("fertilizer_sample.csv");
    let prepared = DatasetPreparer::default()
        .prepare(Task::Fertilizer, &df)
        .unwrap();

    assert_eq!(prepared.n_rows(), 90);
    assert_eq!(prepared.n_features(), 18);

    let TargetValues::Classes { encoder, encoded } = &prepared.target else {
        panic!("fertilizer target should be categorical");
    };
    assert_eq!(encoder.classes(), &["DAP", "MOP", "Urea"]);
    assert!(encoded.iter().all(|c| *c < 3));

    let encoders = prepared.fertilizer_encoders.as_ref().unwrap();
    assert_eq!(encoders.district.len(), 5);
    assert!(encoders.district_baselines.contains_key("Pune"));
}

#[test]
fn test_fertilizer_table_has_no_health_target() {
    let df = load_fixture("fertilizer_sample.csv");
    let err = DatasetPreparer::default()
        .prepare(Task::CropHealth, &df)
        .unwrap_err();

    assert!(matches!(err, ProcessingError::TargetNotFound(ref c) if c == "Crop_Health_Label"));
    assert_eq!(err.error_code(), "TARGET_NOT_FOUND");
}
