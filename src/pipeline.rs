//! End-to-end training run
//!
//! CSV ingestion, feature transformation and model selection executed in
//! sequence with one [`PipelineConfig`].

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{Result, SeverityError};
use crate::training::{default_roster, ModelCandidate, ModelTrainer, TrainingReport};
use crate::transformation::DataTransformation;
use crate::utils::DataLoader;
use polars::prelude::DataFrame;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Orchestrates one training run
pub struct TrainingPipeline {
    config: PipelineConfig,
    candidates: Vec<ModelCandidate>,
    loader: DataLoader,
}

impl TrainingPipeline {
    /// Pipeline over the default eight-family roster
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            candidates: default_roster(),
            loader: DataLoader::new(),
        }
    }

    /// Replace the candidate roster
    pub fn with_candidates(mut self, candidates: Vec<ModelCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    /// Load both CSV files and run the pipeline
    pub fn run(&self, train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<TrainingReport> {
        let train_df = self.loader.load_csv(train_path)?;
        let test_df = self.loader.load_csv(test_path)?;
        self.run_frames(&train_df, &test_df)
    }

    /// Transform, search and persist from in-memory tables.
    ///
    /// When the acceptance gate rejects every model and rollback is enabled,
    /// the preprocessor written by this run is removed again.
    pub fn run_frames(&self, train_df: &DataFrame, test_df: &DataFrame) -> Result<TrainingReport> {
        self.config.validate()?;
        let start = Instant::now();

        let data = DataTransformation::new(self.config.clone()).initiate(train_df, test_df)?;
        let trainer = ModelTrainer::new(self.config.clone());

        match trainer.select_best(&data, &self.candidates) {
            Ok(report) => {
                info!(
                    model = %report.best_model,
                    accuracy = report.accuracy,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Training pipeline complete"
                );
                Ok(report)
            }
            Err(e @ SeverityError::NoAcceptableModel { .. }) if self.config.rollback_on_rejection => {
                warn!(path = %data.preprocessor_path.display(), "Removing preprocessor after rejection");
                ArtifactStore::new().remove(&data.preprocessor_path)?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
