//! Model search and selection engine

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::candidate::{Estimator, ModelCandidate, ModelFamily};
use super::cross_validation::{CVStrategy, CrossValidator};
use super::metrics::{accuracy, ClassificationReport};
use super::models::Classifier;
use super::params::{format_params, ParamSet};
use super::search::GridSearchCV;
use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{Result, SeverityError};
use crate::transformation::TransformedData;

/// The persisted winner of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub estimator: Estimator,
    /// Severity labels by class index
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    /// Held-out accuracy at selection time
    pub accuracy: f64,
    pub best_params: ParamSet,
    pub trained_at: DateTime<Utc>,
}

/// Search outcome of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub name: String,
    pub family: ModelFamily,
    pub best_params: ParamSet,
    /// Mean cross-validated accuracy of `best_params`
    pub cv_score: f64,
    /// Accuracy on the held-out test split
    pub test_accuracy: f64,
    pub elapsed_secs: f64,
}

/// Summary of a successful selection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub best_model: String,
    pub accuracy: f64,
    /// Every scored candidate, in roster order
    pub candidates: Vec<CandidateScore>,
    /// Candidates dropped after exceeding the search timeout
    pub skipped: Vec<String>,
    pub classification_report: ClassificationReport,
    pub model_path: PathBuf,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model: {}\nAccuracy: {:.2}\n\n{}",
            self.best_model, self.accuracy, self.classification_report
        )
    }
}

/// Runs the grid search for every candidate and keeps the best on test
pub struct ModelTrainer {
    config: PipelineConfig,
    store: ArtifactStore,
}

impl ModelTrainer {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            store: ArtifactStore::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Search every candidate, gate the winner and persist it.
    ///
    /// The winner is the strictly highest test accuracy, first in roster
    /// order on ties. A winner below the acceptance threshold fails with
    /// [`SeverityError::NoAcceptableModel`] and nothing is written.
    pub fn select_best(&self, data: &TransformedData, candidates: &[ModelCandidate]) -> Result<TrainingReport> {
        self.config.validate()?;
        if candidates.is_empty() {
            return Err(SeverityError::ConfigError("no model candidates given".to_string()));
        }

        let (x_train, y_train) = TransformedData::split_xy(&data.train)?;
        let (x_test, y_test) = TransformedData::split_xy(&data.test)?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            candidates = candidates.len(),
            "Starting model search"
        );

        let mut cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: false,
        });
        if let Some(seed) = self.config.random_state {
            cv = cv.with_random_state(seed);
        }

        let mut scored: Vec<(CandidateScore, Estimator)> = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();
        let mut last_timeout = None;

        for candidate in candidates {
            let start = Instant::now();
            let search = GridSearchCV::new(candidate.family, candidate.grid.clone())
                .with_cv(cv.clone())
                .with_random_state(self.config.random_state)
                .with_n_jobs(self.config.n_jobs)
                .with_timeout(self.config.candidate_timeout);

            let result = match search.fit(&x_train, &y_train) {
                Ok(result) => result,
                Err(e @ SeverityError::SearchTimeout { .. }) => {
                    warn!(candidate = %candidate.name, "Skipping candidate: {}", e);
                    skipped.push(candidate.name.clone());
                    last_timeout = Some(e);
                    continue;
                }
                Err(e) => {
                    return Err(SeverityError::SearchFailed {
                        candidate: candidate.name.clone(),
                        source: Box::new(e),
                    })
                }
            };

            let test_accuracy = result
                .best_estimator
                .score(&x_test, &y_test)
                .map_err(|e| SeverityError::SearchFailed {
                    candidate: candidate.name.clone(),
                    source: Box::new(e),
                })?;

            info!(
                candidate = %candidate.name,
                params = %format_params(&result.best_params),
                cv_score = result.best_score,
                test_accuracy,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Candidate evaluated"
            );

            scored.push((
                CandidateScore {
                    name: candidate.name.clone(),
                    family: candidate.family,
                    best_params: result.best_params,
                    cv_score: result.best_score,
                    test_accuracy,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                },
                result.best_estimator,
            ));
        }

        if scored.is_empty() {
            let source = last_timeout
                .unwrap_or_else(|| SeverityError::TrainingError("no candidate was evaluated".to_string()));
            return Err(SeverityError::SearchFailed {
                candidate: "all candidates".to_string(),
                source: Box::new(source),
            });
        }

        let best_idx = select_winner(scored.iter().map(|(s, _)| s.test_accuracy));
        let (best, estimator) = &scored[best_idx];

        if best.test_accuracy < self.config.acceptance_threshold {
            warn!(
                model = %best.name,
                accuracy = best.test_accuracy,
                threshold = self.config.acceptance_threshold,
                "Best model below acceptance threshold"
            );
            return Err(SeverityError::NoAcceptableModel {
                model: best.name.clone(),
                score: best.test_accuracy,
                threshold: self.config.acceptance_threshold,
            });
        }
        info!(model = %best.name, accuracy = best.test_accuracy, "Best model found");

        let y_pred: Array1<f64> = estimator.predict(&x_test)?;
        let classification_report = ClassificationReport::new(&y_test, &y_pred, &data.classes)?;

        let artifact = ModelArtifact {
            name: best.name.clone(),
            estimator: estimator.clone(),
            classes: data.classes.clone(),
            feature_names: data.feature_names.clone(),
            accuracy: accuracy(&y_test, &y_pred),
            best_params: best.best_params.clone(),
            trained_at: Utc::now(),
        };
        let model_path = self.config.model_path();
        self.store.save(&artifact, &model_path)?;

        Ok(TrainingReport {
            best_model: best.name.clone(),
            accuracy: artifact.accuracy,
            candidates: scored.into_iter().map(|(s, _)| s).collect(),
            skipped,
            classification_report,
            model_path,
        })
    }
}

/// Index of the strictly highest score; the first wins ties
fn select_winner(scores: impl IntoIterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, score) in scores.into_iter().enumerate() {
        if score > best {
            best = score;
            best_idx = i;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::ParamGrid;
    use ndarray::{concatenate, Array2, Axis};
    use tempfile::tempdir;

    fn separable_data(classes: &[&str]) -> TransformedData {
        let make = |n: usize, offset: f64| {
            let x = Array2::from_shape_fn((n, 2), |(i, j)| (i % 3) as f64 * 4.0 + ((i + j) as f64 * 0.7 + offset).sin() * 0.5);
            let y = Array2::from_shape_fn((n, 1), |(i, _)| (i % 3) as f64);
            concatenate(Axis(1), &[x.view(), y.view()]).unwrap()
        };
        TransformedData {
            train: make(60, 0.0),
            test: make(15, 1.3),
            preprocessor_path: PathBuf::from("unused"),
            classes: classes.iter().map(|s| s.to_string()).collect(),
            feature_names: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn test_select_winner_first_on_ties() {
        assert_eq!(select_winner(vec![0.5, 0.9, 0.9, 0.1]), 1);
        assert_eq!(select_winner(vec![0.7]), 0);
    }

    #[test]
    fn test_select_best_persists_winner() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::default().with_artifact_dir(dir.path());
        let data = separable_data(&["Fatal", "Minor", "Serious"]);
        let roster = vec![
            ModelCandidate::new("Tree", ModelFamily::DecisionTree, ParamGrid::new().with("max_depth", [3i64])),
            ModelCandidate::new("KNN", ModelFamily::KNeighbors, ParamGrid::new()),
        ];

        let report = ModelTrainer::new(config.clone()).select_best(&data, &roster).unwrap();
        assert_eq!(report.best_model, "Tree");
        assert_eq!(report.candidates.len(), 2);
        assert!(report.accuracy >= 0.6);

        let text = report.to_string();
        assert!(text.starts_with("Model: Tree\nAccuracy: "));
        assert!(text.contains("Serious"));

        let artifact: ModelArtifact = ArtifactStore::new().load(config.model_path()).unwrap();
        assert_eq!(artifact.name, "Tree");
        assert_eq!(artifact.classes.len(), 3);
    }

    #[test]
    fn test_gate_rejects_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::default().with_artifact_dir(dir.path());
        let mut data = separable_data(&["A", "B", "C"]);
        // Rotate test labels so every prediction is wrong
        for (i, mut row) in data.test.rows_mut().into_iter().enumerate() {
            row[2] = ((i + 1) % 3) as f64;
        }
        let roster = vec![ModelCandidate::new("Tree", ModelFamily::DecisionTree, ParamGrid::new())];

        let err = ModelTrainer::new(config.clone()).select_best(&data, &roster).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AcceptanceGate);
        assert!(!config.model_path().exists());
    }

    #[test]
    fn test_search_error_names_candidate() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::default().with_artifact_dir(dir.path());
        let data = separable_data(&["A", "B", "C"]);
        let roster = vec![ModelCandidate::new(
            "Broken",
            ModelFamily::AdaBoost,
            ParamGrid::new().with("n_estimators", [0i64]),
        )];

        let err = ModelTrainer::new(config).select_best(&data, &roster).unwrap_err();
        match err {
            SeverityError::SearchFailed { candidate, .. } => assert_eq!(candidate, "Broken"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_all_candidates_timed_out() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::default()
            .with_artifact_dir(dir.path())
            .with_candidate_timeout(std::time::Duration::ZERO);
        let data = separable_data(&["A", "B", "C"]);
        let roster = vec![ModelCandidate::new("Tree", ModelFamily::DecisionTree, ParamGrid::new())];

        let err = ModelTrainer::new(config).select_best(&data, &roster).unwrap_err();
        assert!(matches!(err, SeverityError::SearchFailed { .. }));
        assert!(matches!(err.root_cause(), SeverityError::SearchTimeout { .. }));
    }
}
