//! Integration test: grid search over candidate families and the acceptance gate

use accident_severity::artifact::ArtifactStore;
use accident_severity::config::PipelineConfig;
use accident_severity::error::{ErrorKind, SeverityError};
use accident_severity::training::{
    Classifier, ModelArtifact, ModelCandidate, ModelFamily, ModelTrainer, ParamGrid, ParamValue,
};
use accident_severity::transformation::TransformedData;
use ndarray::{concatenate, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

fn with_target(x: Array2<f64>, y: Vec<f64>) -> Array2<f64> {
    let n = y.len();
    let y = Array2::from_shape_vec((n, 1), y).unwrap();
    concatenate(Axis(1), &[x.view(), y.view()]).unwrap()
}

/// Three well separated clusters
fn clustered(n_train: usize, n_test: usize) -> TransformedData {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut make = |n: usize| {
        let y: Vec<f64> = (0..n).map(|i| (i % 3) as f64).collect();
        let x = Array2::from_shape_fn((n, 4), |(i, j)| {
            let center = if j < 2 { (i % 3) as f64 * 5.0 } else { 0.0 };
            center + rng.gen_range(-1.0..1.0)
        });
        with_target(x, y)
    };
    TransformedData {
        train: make(n_train),
        test: make(n_test),
        preprocessor_path: PathBuf::from("unused"),
        classes: vec!["High".into(), "Low".into(), "Medium".into()],
        feature_names: (0..4).map(|j| format!("f{}", j)).collect(),
    }
}

/// Features carry no information about the labels
fn noise(n_train: usize, n_test: usize) -> TransformedData {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut make = |n: usize| {
        let x = Array2::from_shape_fn((n, 5), |_| rng.gen_range(-1.0..1.0));
        let y: Vec<f64> = (0..n).map(|_| rng.gen_range(0..3) as f64).collect();
        with_target(x, y)
    };
    TransformedData {
        train: make(n_train),
        test: make(n_test),
        preprocessor_path: PathBuf::from("unused"),
        classes: vec!["High".into(), "Low".into(), "Medium".into()],
        feature_names: (0..5).map(|j| format!("f{}", j)).collect(),
    }
}

fn small_roster() -> Vec<ModelCandidate> {
    vec![
        ModelCandidate::new(
            "Random Forest",
            ModelFamily::RandomForest,
            ParamGrid::new().with("n_estimators", [10i64, 20]).with("max_depth", [3i64]),
        ),
        ModelCandidate::new(
            "Decision Tree",
            ModelFamily::DecisionTree,
            ParamGrid::new().with("criterion", ["gini", "entropy"]).with("max_depth", [5i64]),
        ),
        ModelCandidate::new(
            "XGBClassifier",
            ModelFamily::XGBoost,
            ParamGrid::new().with("n_estimators", [10i64]).with("learning_rate", [0.1, 0.3]),
        ),
        ModelCandidate::new("KNeighborsClassifier", ModelFamily::KNeighbors, ParamGrid::new().with("n_neighbors", [3i64, 5])),
    ]
}

#[test]
fn test_logistic_regression_on_noise_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let roster = vec![ModelCandidate::new("Logistic Regression", ModelFamily::LogisticRegression, ParamGrid::new())];

    let err = ModelTrainer::new(config.clone()).select_best(&noise(150, 90), &roster).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AcceptanceGate);
    match err {
        SeverityError::NoAcceptableModel { model, score, threshold } => {
            assert_eq!(model, "Logistic Regression");
            assert!(score < threshold);
            assert_eq!(threshold, 0.6);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!config.model_path().exists());
}

#[test]
fn test_winner_is_persisted_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let data = clustered(90, 30);

    let report = ModelTrainer::new(config.clone()).select_best(&data, &small_roster()).unwrap();
    assert_eq!(report.candidates.len(), 4);
    assert!(report.skipped.is_empty());
    assert!(report.accuracy >= 0.6);

    let best = report
        .candidates
        .iter()
        .map(|c| c.test_accuracy)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(report.accuracy, best);

    let first_best = report.candidates.iter().find(|c| c.test_accuracy == best).unwrap();
    assert_eq!(report.best_model, first_best.name);

    let artifact: ModelArtifact = ArtifactStore::new().load(&report.model_path).unwrap();
    assert_eq!(artifact.name, report.best_model);
    assert_eq!(artifact.classes, data.classes);

    let (x_test, y_test) = TransformedData::split_xy(&data.test).unwrap();
    assert_eq!(artifact.estimator.score(&x_test, &y_test).unwrap(), report.accuracy);

    let text = report.to_string();
    assert!(text.starts_with(&format!("Model: {}\nAccuracy: ", report.best_model)));
    for label in ["High", "Low", "Medium", "accuracy", "macro avg", "weighted avg"] {
        assert!(text.contains(label), "report is missing {}", label);
    }

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["best_model"], report.best_model.as_str());
    assert_eq!(json["candidates"].as_array().unwrap().len(), 4);
}

#[test]
fn test_same_seed_same_winner() {
    let data = clustered(60, 30);
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default().with_artifact_dir(dir.path()).with_random_state(3);
        ModelTrainer::new(config).select_best(&data, &small_roster()).unwrap()
    };

    let a = run();
    let b = run();
    assert_eq!(a.best_model, b.best_model);
    assert_eq!(a.accuracy, b.accuracy);
    for (x, y) in a.candidates.iter().zip(&b.candidates) {
        assert_eq!(x.best_params, y.best_params);
        assert_eq!(x.cv_score, y.cv_score);
        assert_eq!(x.test_accuracy, y.test_accuracy);
    }
}

#[test]
fn test_roster_order_breaks_ties() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let grid = ParamGrid::new().with("max_depth", [4i64]);
    let roster = vec![
        ModelCandidate::new("First", ModelFamily::DecisionTree, grid.clone()),
        ModelCandidate::new("Second", ModelFamily::DecisionTree, grid),
    ];

    let report = ModelTrainer::new(config).select_best(&clustered(60, 21), &roster).unwrap();
    assert_eq!(report.candidates[0].test_accuracy, report.candidates[1].test_accuracy);
    assert_eq!(report.best_model, "First");
}

#[test]
fn test_invalid_parameter_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let mut roster = small_roster();
    roster.push(ModelCandidate::new(
        "Broken",
        ModelFamily::GradientBoosting,
        ParamGrid::new().with("no_such_param", [1i64]),
    ));

    let err = ModelTrainer::new(config.clone()).select_best(&clustered(60, 21), &roster).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Search);
    assert!(matches!(err.root_cause(), SeverityError::InvalidParameter { .. }));
    assert!(!config.model_path().exists());
}

#[test]
fn test_best_params_come_from_grid() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_cv_folds(3)
        .with_acceptance_threshold(0.0);
    let roster = vec![ModelCandidate::new(
        "AdaBoostClassifier",
        ModelFamily::AdaBoost,
        ParamGrid::new().with("n_estimators", [5i64, 10]).with("learning_rate", [0.5, 1.0]),
    )];

    let report = ModelTrainer::new(config).select_best(&clustered(60, 30), &roster).unwrap();
    let params = &report.candidates[0].best_params;
    assert!(matches!(params["n_estimators"], ParamValue::Int(5) | ParamValue::Int(10)));
    assert!(matches!(params["learning_rate"], ParamValue::Float(_)));
}
