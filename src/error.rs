//! Error types for the accident severity pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, SeverityError>;

/// Coarse error category callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required column is missing or has an unusable type
    Schema,
    /// Preprocessor or estimator fitting failed
    Fit,
    /// Hyperparameter search failed for a candidate
    Search,
    /// The best model did not clear the acceptance threshold
    AcceptanceGate,
    /// An artifact could not be read or written
    ArtifactIo,
    /// Input data is malformed
    Data,
    /// Configuration is invalid
    Config,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum SeverityError {
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Data transformation failed: {source}")]
    TransformationFailed {
        #[source]
        source: Box<SeverityError>,
    },

    #[error("Grid search failed for {candidate}: {source}")]
    SearchFailed {
        candidate: String,
        #[source]
        source: Box<SeverityError>,
    },

    #[error("Search timed out after {elapsed_secs:.1}s (limit {limit_secs:.1}s)")]
    SearchTimeout { elapsed_secs: f64, limit_secs: f64 },

    #[error("No suitable model found with acceptable accuracy: best was {model} at {score:.4}, threshold {threshold}")]
    NoAcceptableModel {
        model: String,
        score: f64,
        threshold: f64,
    },

    #[error("Artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("Corrupt artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SeverityError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeverityError::SchemaError(_) | SeverityError::FeatureNotFound(_) => ErrorKind::Schema,
            SeverityError::DataError(_) | SeverityError::ShapeError { .. } => ErrorKind::Data,
            SeverityError::ModelNotFitted
            | SeverityError::TrainingError(_)
            | SeverityError::TransformationFailed { .. } => ErrorKind::Fit,
            SeverityError::InvalidParameter { .. }
            | SeverityError::SearchFailed { .. }
            | SeverityError::SearchTimeout { .. } => ErrorKind::Search,
            SeverityError::NoAcceptableModel { .. } => ErrorKind::AcceptanceGate,
            SeverityError::ArtifactNotFound(_)
            | SeverityError::CorruptArtifact { .. }
            | SeverityError::IoError(_)
            | SeverityError::SerializationError(_) => ErrorKind::ArtifactIo,
            SeverityError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Innermost wrapped error, skipping transformation/search wrappers
    pub fn root_cause(&self) -> &SeverityError {
        match self {
            SeverityError::TransformationFailed { source }
            | SeverityError::SearchFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<polars::error::PolarsError> for SeverityError {
    fn from(err: polars::error::PolarsError) -> Self {
        match err {
            polars::error::PolarsError::ColumnNotFound(msg) => SeverityError::SchemaError(msg.to_string()),
            other => SeverityError::DataError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SeverityError {
    fn from(err: serde_json::Error) -> Self {
        SeverityError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for SeverityError {
    fn from(err: bincode::Error) -> Self {
        SeverityError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SeverityError {
    fn from(err: ndarray::ShapeError) -> Self {
        SeverityError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
