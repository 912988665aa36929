//! Integration test: labeled tables → numeric matrices + persisted preprocessor

use accident_severity::artifact::ArtifactStore;
use accident_severity::config::PipelineConfig;
use accident_severity::error::{ErrorKind, SeverityError};
use accident_severity::preprocessing::Preprocessor;
use accident_severity::transformation::{DataTransformation, TransformedData};
use polars::prelude::*;

const WEATHER: [&str; 3] = ["Clear", "Rainy", "Foggy"];
const ROAD: [&str; 3] = ["Dry", "Wet", "Icy"];
const TIME: [&str; 3] = ["Morning", "Evening", "Night"];
const TRAFFIC: [&str; 3] = ["Low", "Moderate", "Heavy"];
const KIND: [&str; 2] = ["Collision", "Rollover"];
const VEHICLE: [&str; 3] = ["Car", "Truck", "Bike"];
const REASON: [&str; 3] = ["Speeding", "Fatigue", "Distraction"];
const SEVERITY: [&str; 3] = ["Low", "Medium", "High"];

fn accident_frame(n: usize, with_dates: bool) -> DataFrame {
    let pick = |values: &[&'static str], f: &dyn Fn(usize) -> usize| -> Vec<&'static str> {
        (0..n).map(|i| values[f(i) % values.len()]).collect()
    };
    let mut df = df!(
        "Latitude" => (0..n).map(|i| 12.0 + (i % 10) as f64 * 0.1).collect::<Vec<_>>(),
        "Longitude" => (0..n).map(|i| 77.0 + (i % 7) as f64 * 0.1).collect::<Vec<_>>(),
        "Weather" => pick(&WEATHER, &|i| i),
        "Road_Condition" => pick(&ROAD, &|i| i / 3),
        "Time_of_Day" => pick(&TIME, &|i| i * 7),
        "Traffic" => pick(&TRAFFIC, &|i| i / 2),
        "Accident_Type" => pick(&KIND, &|i| i),
        "Vehicle_Type" => pick(&VEHICLE, &|i| i / 5),
        "Accident_Reason" => pick(&REASON, &|i| i + 1),
        "Severity" => pick(&SEVERITY, &|i| i)
    )
    .unwrap();
    if with_dates {
        let dates: Vec<String> = (0..n).map(|i| format!("2024-01-{:02}", i % 28 + 1)).collect();
        let times: Vec<String> = (0..n).map(|i| format!("{:02}:00", i % 24)).collect();
        df.with_column(Column::new("Date".into(), dates)).unwrap();
        df.with_column(Column::new("Time".into(), times)).unwrap();
    }
    df
}

#[test]
fn test_transform_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = accident_frame(100, true);
    let test = accident_frame(20, true);

    let data = DataTransformation::new(config.clone()).initiate(&train, &test).unwrap();

    // 2 numeric + 3+3+3+3+2+3+3 one-hot columns, plus the target
    assert_eq!(data.train.dim(), (100, 23));
    assert_eq!(data.test.dim(), (20, 23));
    assert_eq!(data.n_features(), 22);
    assert_eq!(data.feature_names.len(), 22);
    assert_eq!(data.classes, vec!["High", "Low", "Medium"]);
    assert_eq!(data.preprocessor_path, config.preprocessor_path());
    assert!(config.preprocessor_path().exists());

    let (_, y) = TransformedData::split_xy(&data.train).unwrap();
    assert!(y.iter().all(|&v| v == 0.0 || v == 1.0 || v == 2.0));
}

#[test]
fn test_date_time_columns_do_not_matter() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let stage = DataTransformation::new(config);

    let with = stage
        .initiate(&accident_frame(60, true), &accident_frame(15, true))
        .unwrap();
    let without = stage
        .initiate(&accident_frame(60, false), &accident_frame(15, false))
        .unwrap();

    assert_eq!(with.train, without.train);
    assert_eq!(with.test, without.test);
}

#[test]
fn test_preprocessor_fit_on_train_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = accident_frame(60, false);
    let mut test = accident_frame(60, false);
    // Shift test latitudes far away; train statistics must not move
    let shifted: Vec<f64> = (0..60).map(|i| 80.0 + i as f64).collect();
    test.with_column(Column::new("Latitude".into(), shifted)).unwrap();

    let stage = DataTransformation::new(config);
    let a = stage.initiate(&train, &accident_frame(10, false)).unwrap();
    let b = stage.initiate(&train, &test).unwrap();
    assert_eq!(a.train, b.train);

    // Standardized train latitude has zero mean
    let mean = b.train.column(0).mean().unwrap();
    assert!(mean.abs() < 1e-9);
}

#[test]
fn test_unseen_category_encodes_to_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = accident_frame(30, false);
    let mut test = accident_frame(3, false);
    test.with_column(Column::new("Weather".into(), ["Hail", "Hail", "Hail"])).unwrap();

    let data = DataTransformation::new(config.clone()).initiate(&train, &test).unwrap();
    let weather_cols: Vec<usize> = data
        .feature_names
        .iter()
        .enumerate()
        .filter(|(_, name)| name.starts_with("Weather_"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(weather_cols.len(), 3);
    for row in data.test.rows() {
        assert!(weather_cols.iter().all(|&j| row[j] == 0.0));
    }

    let preprocessor: Preprocessor = ArtifactStore::new().load(config.preprocessor_path()).unwrap();
    assert_eq!(preprocessor.output_dim(), 22);
}

#[test]
fn test_missing_column_is_wrapped_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = accident_frame(20, false).drop("Traffic").unwrap();
    let test = accident_frame(5, false);

    let err = DataTransformation::new(config.clone()).initiate(&train, &test).unwrap_err();
    assert!(matches!(err, SeverityError::TransformationFailed { .. }));
    assert_eq!(err.root_cause().kind(), ErrorKind::Schema);
    assert!(std::error::Error::source(&err).is_some());
    assert!(!config.preprocessor_path().exists());
}

#[test]
fn test_unwritable_artifact_dir_is_artifact_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"regular file").unwrap();
    let config = PipelineConfig::default().with_artifact_dir(blocker.join("artifacts"));

    let err = DataTransformation::new(config)
        .initiate(&accident_frame(30, false), &accident_frame(6, false))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactIo);
    assert!(!matches!(err, SeverityError::TransformationFailed { .. }));
}

#[test]
fn test_all_null_feature_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let mut train = accident_frame(60, false);
    train
        .with_column(Series::full_null("Accident_Reason".into(), 60, &DataType::String))
        .unwrap();
    let test = accident_frame(15, false);

    let data = DataTransformation::new(config.clone()).initiate(&train, &test).unwrap();

    // the three Accident_Reason indicators are gone
    assert_eq!(data.n_features(), 19);
    assert_eq!(data.test.dim(), (15, 20));
    assert!(data.feature_names.iter().all(|name| !name.starts_with("Accident_Reason")));

    let preprocessor: Preprocessor = ArtifactStore::new().load(config.preprocessor_path()).unwrap();
    assert_eq!(preprocessor.transform(&test).unwrap().ncols(), 19);
}
