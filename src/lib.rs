//! Accident severity prediction
//!
//! Trains classifiers that predict the severity of a road accident from its
//! location and categorical descriptors, and serves predictions from the
//! persisted winner.
//!
//! # Modules
//!
//! ## Pipeline stages
//! - [`preprocessing`] - Imputation, scaling and one-hot encoding
//! - [`transformation`] - Labeled tables to numeric train/test matrices
//! - [`training`] - Classifier families, grid search and model selection
//! - [`artifact`] - Persistence of fitted objects
//! - [`inference`] - Prediction from persisted artifacts
//! - [`pipeline`] - One training run end to end
//!
//! ## Support
//! - [`config`] - Pipeline configuration
//! - [`schema`] - Accident feature schema and serving records
//! - [`utils`] - CSV loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use accident_severity::prelude::*;
//!
//! let config = PipelineConfig::default().with_artifact_dir("artifacts");
//! let report = TrainingPipeline::new(config.clone()).run("train.csv", "test.csv")?;
//! println!("{}", report);
//!
//! let pipeline = PredictPipeline::load(&config)?;
//! let record = AccidentRecord {
//!     weather: Some("Rainy".to_string()),
//!     latitude: Some(12.97),
//!     longitude: Some(77.59),
//!     ..Default::default()
//! };
//! let labels = pipeline.predict(&[record])?;
//! # Ok::<(), accident_severity::error::SeverityError>(())
//! ```

pub mod error;
pub mod config;
pub mod schema;

pub mod preprocessing;
pub mod transformation;
pub mod training;
pub mod artifact;
pub mod inference;
pub mod pipeline;

pub mod utils;
pub mod cli;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::ArtifactStore;
    pub use crate::config::PipelineConfig;
    pub use crate::error::{ErrorKind, Result, SeverityError};
    pub use crate::inference::{PredictPipeline, Prediction};
    pub use crate::pipeline::TrainingPipeline;
    pub use crate::preprocessing::{Preprocessor, PreprocessorBuilder};
    pub use crate::schema::{AccidentRecord, FeatureSchema};
    pub use crate::training::{
        default_roster, Classifier, Estimator, ModelArtifact, ModelCandidate, ModelFamily,
        ModelTrainer, ParamGrid, TrainingReport,
    };
    pub use crate::transformation::{DataTransformation, TransformedData};
    pub use crate::utils::DataLoader;
}
