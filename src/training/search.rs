//! Exhaustive hyperparameter search with cross-validation

use std::time::{Duration, Instant};

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::candidate::{Estimator, ModelFamily};
use super::cross_validation::{CVResults, CVStrategy, CrossValidator};
use super::models::Classifier;
use super::params::{format_params, ParamGrid, ParamSet};
use crate::error::{Result, SeverityError};

/// Cross-validated score of one parameter assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboResult {
    pub params: ParamSet,
    pub cv: CVResults,
}

/// Outcome of a grid search: the winning assignment refit on all rows
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_params: ParamSet,
    /// Mean fold accuracy of `best_params`
    pub best_score: f64,
    pub best_estimator: Estimator,
    /// One entry per combination, in enumeration order
    pub cv_results: Vec<ComboResult>,
}

/// Grid search over one model family.
///
/// Every combination is scored by mean accuracy over the folds of
/// `cv`; the earliest combination with the highest mean wins and is refit
/// on the full training data.
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    family: ModelFamily,
    grid: ParamGrid,
    cv: CrossValidator,
    random_state: Option<u64>,
    n_jobs: Option<usize>,
    timeout: Option<Duration>,
}

impl GridSearchCV {
    pub fn new(family: ModelFamily, grid: ParamGrid) -> Self {
        Self {
            family,
            grid,
            cv: CrossValidator::new(CVStrategy::default()),
            random_state: None,
            n_jobs: None,
            timeout: None,
        }
    }

    pub fn with_cv(mut self, cv: CrossValidator) -> Self {
        self.cv = cv;
        self
    }

    /// Seed handed to every estimator built during the search
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Worker threads for fold evaluation (None = rayon global pool)
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Abort with a timeout error once the search runs longer than `limit`
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        match self.n_jobs {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| SeverityError::ConfigError(format!("thread pool: {}", e)))?;
                pool.install(|| self.run(x, y))
            }
            None => self.run(x, y),
        }
    }

    fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult> {
        let started = Instant::now();
        let combos = self.grid.combinations();
        if combos.is_empty() {
            return Err(SeverityError::InvalidParameter {
                name: self.grid.names().collect::<Vec<_>>().join(","),
                value: "[]".to_string(),
                reason: "grid has a parameter with no values".to_string(),
            });
        }
        let splits = self.cv.split(x.nrows(), Some(y))?;

        // Folds are materialised once and shared read-only by every task
        let folds: Vec<(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)> = splits
            .iter()
            .map(|s| {
                (
                    x.select(Axis(0), &s.train_indices),
                    y.select(Axis(0), &s.train_indices),
                    x.select(Axis(0), &s.test_indices),
                    y.select(Axis(0), &s.test_indices),
                )
            })
            .collect();

        let tasks: Vec<(usize, usize)> = (0..combos.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let scores: Vec<f64> = tasks
            .par_iter()
            .map(|&(c, f)| -> Result<f64> {
                self.check_deadline(started)?;
                let (x_train, y_train, x_test, y_test) = &folds[f];
                let mut estimator = self.family.instantiate(&combos[c], self.random_state)?;
                estimator.fit(x_train, y_train)?;
                estimator.score(x_test, y_test)
            })
            .collect::<Result<Vec<_>>>()?;

        let cv_results: Vec<ComboResult> = combos
            .into_iter()
            .zip(scores.chunks(folds.len()))
            .map(|(params, fold_scores)| ComboResult {
                params,
                cv: CVResults::from_scores(fold_scores.to_vec()),
            })
            .collect();

        let mut best_idx = 0;
        for (i, result) in cv_results.iter().enumerate() {
            debug!(
                "{} {} mean={:.4} std={:.4}",
                self.family,
                format_params(&result.params),
                result.cv.mean_score,
                result.cv.std_score
            );
            if result.cv.mean_score > cv_results[best_idx].cv.mean_score {
                best_idx = i;
            }
        }

        self.check_deadline(started)?;
        let best_params = cv_results[best_idx].params.clone();
        let mut best_estimator = self.family.instantiate(&best_params, self.random_state)?;
        best_estimator.fit(x, y)?;

        Ok(SearchResult {
            best_params,
            best_score: cv_results[best_idx].cv.mean_score,
            best_estimator,
            cv_results,
        })
    }

    fn check_deadline(&self, started: Instant) -> Result<()> {
        if let Some(limit) = self.timeout {
            let elapsed = started.elapsed();
            if elapsed > limit {
                return Err(SeverityError::SearchTimeout {
                    elapsed_secs: elapsed.as_secs_f64(),
                    limit_secs: limit.as_secs_f64(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::ParamValue;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            let class = (i % 3) as f64;
            class * 3.0 + (i as f64 * 0.37 + j as f64).sin() * 0.3
        });
        let y: Array1<f64> = (0..30).map(|i| (i % 3) as f64).collect();
        (x, y)
    }

    #[test]
    fn test_grid_search_picks_best() {
        let (x, y) = blobs();
        let grid = ParamGrid::new().with("max_depth", [1i64, 4]);
        let search = GridSearchCV::new(ModelFamily::DecisionTree, grid).with_random_state(Some(0));
        let result = search.fit(&x, &y).unwrap();

        assert_eq!(result.cv_results.len(), 2);
        assert_eq!(result.best_params["max_depth"], ParamValue::Int(4));
        assert!(result.best_score > result.cv_results[0].cv.mean_score);
        assert_eq!(result.best_estimator.score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_ties_keep_first_combination() {
        let (x, y) = blobs();
        let grid = ParamGrid::new().with("max_depth", [5i64, 10]);
        let result = GridSearchCV::new(ModelFamily::DecisionTree, grid).fit(&x, &y).unwrap();
        assert_eq!(result.cv_results[0].cv.mean_score, result.cv_results[1].cv.mean_score);
        assert_eq!(result.best_params["max_depth"], ParamValue::Int(5));
    }

    #[test]
    fn test_empty_grid_fits_defaults() {
        let (x, y) = blobs();
        let result = GridSearchCV::new(ModelFamily::KNeighbors, ParamGrid::new())
            .with_n_jobs(Some(2))
            .fit(&x, &y)
            .unwrap();
        assert_eq!(result.cv_results.len(), 1);
        assert!(result.best_params.is_empty());
        assert_eq!(result.cv_results[0].cv.n_folds, 5);
    }

    #[test]
    fn test_invalid_parameter_propagates() {
        let (x, y) = blobs();
        let grid = ParamGrid::new().with("n_neighbors", [0i64]);
        let err = GridSearchCV::new(ModelFamily::KNeighbors, grid).fit(&x, &y).unwrap_err();
        assert!(matches!(err, SeverityError::InvalidParameter { .. }));
    }

    #[test]
    fn test_zero_timeout_aborts() {
        let (x, y) = blobs();
        let err = GridSearchCV::new(ModelFamily::DecisionTree, ParamGrid::new())
            .with_timeout(Some(Duration::ZERO))
            .fit(&x, &y)
            .unwrap_err();
        assert!(matches!(err, SeverityError::SearchTimeout { .. }));
    }
}
