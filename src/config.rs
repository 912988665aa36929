//! Pipeline configuration

use crate::error::{Result, SeverityError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum held-out accuracy a winning model must reach
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.6;

/// Configuration threaded through transformation, selection and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding persisted artifacts
    pub artifact_dir: PathBuf,
    /// File name of the fitted preprocessor
    pub preprocessor_file: String,
    /// File name of the winning model
    pub model_file: String,
    /// Acceptance gate on held-out accuracy
    pub acceptance_threshold: f64,
    /// Number of stratified folds for grid search
    pub cv_folds: usize,
    /// Seed for every stochastic estimator
    pub random_state: Option<u64>,
    /// Worker threads for grid search (None = rayon default)
    pub n_jobs: Option<usize>,
    /// Per-candidate search budget
    pub candidate_timeout: Option<Duration>,
    /// Remove the freshly written preprocessor when no model is accepted
    pub rollback_on_rejection: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            preprocessor_file: "severity_preprocessor.bin".to_string(),
            model_file: "model.bin".to_string(),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            cv_folds: 5,
            random_state: Some(42),
            n_jobs: None,
            candidate_timeout: None,
            rollback_on_rejection: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `SEVERITY_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SEVERITY_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("SEVERITY_ACCEPTANCE_THRESHOLD") {
            config.acceptance_threshold = parse_env("SEVERITY_ACCEPTANCE_THRESHOLD", &raw)?;
        }
        if let Ok(raw) = std::env::var("SEVERITY_CV_FOLDS") {
            config.cv_folds = parse_env("SEVERITY_CV_FOLDS", &raw)?;
        }
        if let Ok(raw) = std::env::var("SEVERITY_RANDOM_STATE") {
            config.random_state = Some(parse_env("SEVERITY_RANDOM_STATE", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set artifact directory
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set acceptance threshold
    pub fn with_acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    /// Set number of CV folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Set worker thread count
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Set per-candidate timeout
    pub fn with_candidate_timeout(mut self, timeout: Duration) -> Self {
        self.candidate_timeout = Some(timeout);
        self
    }

    /// Enable or disable preprocessor rollback on rejection
    pub fn with_rollback_on_rejection(mut self, rollback: bool) -> Self {
        self.rollback_on_rejection = rollback;
        self
    }

    /// Full path of the preprocessor artifact
    pub fn preprocessor_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.preprocessor_file)
    }

    /// Full path of the model artifact
    pub fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.model_file)
    }

    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(SeverityError::ConfigError(format!(
                "acceptance_threshold must be within [0, 1], got {}",
                self.acceptance_threshold
            )));
        }
        if self.cv_folds < 2 {
            return Err(SeverityError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.n_jobs == Some(0) {
            return Err(SeverityError::ConfigError("n_jobs must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        SeverityError::ConfigError(format!("{} has an invalid value: {}", name, raw))
    })
}
