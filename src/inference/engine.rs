//! Serving-time prediction
//!
//! Loads the persisted preprocessor and winning model once and maps raw
//! accident records to severity labels. The preprocessor is never refit
//! here; unseen categories encode to all-zero indicator blocks.

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{Result, SeverityError};
use crate::preprocessing::Preprocessor;
use crate::schema::AccidentRecord;
use crate::training::{Classifier, ModelArtifact};
use crate::transformation::LabelEncoder;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// A predicted label with the model's probability for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// Preprocessor and model loaded from the artifact directory
#[derive(Debug, Clone)]
pub struct PredictPipeline {
    preprocessor: Preprocessor,
    model: ModelArtifact,
    labels: LabelEncoder,
}

impl PredictPipeline {
    /// Load both artifacts from the paths in `config`
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let start = Instant::now();
        let store = ArtifactStore::new();
        let preprocessor: Preprocessor = store.load(config.preprocessor_path())?;
        let model: ModelArtifact = store.load(config.model_path())?;
        let pipeline = Self::from_parts(preprocessor, model)?;

        info!(
            model = %pipeline.model.name,
            accuracy = pipeline.model.accuracy,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded prediction pipeline"
        );
        Ok(pipeline)
    }

    /// Pair an already loaded preprocessor with a model artifact
    pub fn from_parts(preprocessor: Preprocessor, model: ModelArtifact) -> Result<Self> {
        if !preprocessor.is_fitted() {
            return Err(SeverityError::ModelNotFitted);
        }
        if preprocessor.output_dim() != model.feature_names.len() {
            return Err(SeverityError::ShapeError {
                expected: format!("{} model features", model.feature_names.len()),
                actual: format!("{} preprocessor outputs", preprocessor.output_dim()),
            });
        }
        let labels = LabelEncoder::from_classes(model.classes.clone());
        Ok(Self {
            preprocessor,
            model,
            labels,
        })
    }

    /// Name of the loaded model candidate
    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn model(&self) -> &ModelArtifact {
        &self.model
    }

    /// Severity labels the model can return
    pub fn classes(&self) -> &[String] {
        self.labels.classes()
    }

    /// Predict one severity label per record
    pub fn predict(&self, records: &[AccidentRecord]) -> Result<Vec<String>> {
        let df = AccidentRecord::to_dataframe(records)?;
        self.predict_frame(&df)
    }

    /// Predict labels for a raw feature table. Extra columns are ignored.
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Vec<String>> {
        let x = self.features(df)?;
        let indices = self.model.estimator.predict(&x)?;
        indices
            .iter()
            .map(|&idx| self.labels.decode(idx).map(str::to_string))
            .collect()
    }

    /// Labels together with the probability assigned to each
    pub fn predict_with_confidence(&self, records: &[AccidentRecord]) -> Result<Vec<Prediction>> {
        let df = AccidentRecord::to_dataframe(records)?;
        let x = self.features(&df)?;
        let estimator = &self.model.estimator;
        let indices = estimator.predict(&x)?;
        let proba = estimator.predict_proba(&x)?;

        indices
            .iter()
            .zip(proba.rows())
            .map(|(&idx, row)| {
                let column = estimator.classes().iter().position(|&c| c == idx.round());
                Ok(Prediction {
                    label: self.labels.decode(idx)?.to_string(),
                    confidence: column.map(|j| row[j]).unwrap_or(0.0),
                })
            })
            .collect()
    }

    fn features(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if df.height() == 0 {
            return Err(SeverityError::DataError("no rows to predict".to_string()));
        }
        let x = self.preprocessor.transform(df)?;
        debug!(rows = x.nrows(), features = x.ncols(), "Transformed serving rows");
        Ok(x)
    }
}
