//! Feature transformation stage
//!
//! Turns labeled train/test tables into numeric matrices whose last column
//! is the encoded target, and persists the preprocessor fitted on train.

use crate::artifact::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::{Result, SeverityError};
use crate::preprocessing::{Preprocessor, PreprocessorBuilder};
use crate::schema::FeatureSchema;
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Maps severity labels to class indices in sorted label order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build the vocabulary from every label set given
    pub fn fit<'a>(labels: impl IntoIterator<Item = &'a [String]>) -> Self {
        let vocab: BTreeSet<&String> = labels.into_iter().flatten().collect();
        Self {
            classes: vocab.into_iter().cloned().collect(),
        }
    }

    pub fn from_classes(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn encode(&self, labels: &[String]) -> Result<Array1<f64>> {
        labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map(|idx| idx as f64)
                    .map_err(|_| SeverityError::DataError(format!("unknown label: {}", label)))
            })
            .collect()
    }

    pub fn decode(&self, index: f64) -> Result<&str> {
        let idx = index.round();
        if idx < 0.0 || idx as usize >= self.classes.len() {
            return Err(SeverityError::DataError(format!("class index out of range: {}", index)));
        }
        Ok(&self.classes[idx as usize])
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Output of the transformation stage
#[derive(Debug, Clone)]
pub struct TransformedData {
    /// Train features with the encoded target as last column
    pub train: Array2<f64>,
    /// Test features with the encoded target as last column
    pub test: Array2<f64>,
    /// Where the fitted preprocessor was written
    pub preprocessor_path: PathBuf,
    /// Severity labels by class index
    pub classes: Vec<String>,
    /// Names of the feature columns (target excluded)
    pub feature_names: Vec<String>,
}

impl TransformedData {
    pub fn n_features(&self) -> usize {
        self.train.ncols().saturating_sub(1)
    }

    /// Split a matrix into (features, target)
    pub fn split_xy(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
        let n_cols = matrix.ncols();
        if n_cols < 2 {
            return Err(SeverityError::ShapeError {
                expected: "at least one feature column and a target column".to_string(),
                actual: format!("{} columns", n_cols),
            });
        }
        let x = matrix.slice(ndarray::s![.., ..n_cols - 1]).to_owned();
        let y = matrix.column(n_cols - 1).to_owned();
        Ok((x, y))
    }
}

/// Fits the preprocessor on train and applies it to both tables
pub struct DataTransformation {
    config: PipelineConfig,
    schema: FeatureSchema,
    store: ArtifactStore,
}

impl DataTransformation {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            schema: FeatureSchema::accident(),
            store: ArtifactStore::new(),
        }
    }

    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Build the preprocessor for this stage's schema
    pub fn preprocessor(&self) -> Preprocessor {
        PreprocessorBuilder::new(self.schema.clone()).build()
    }

    /// Transform both tables and persist the fitted preprocessor.
    ///
    /// Split, fit and encode failures are reported as
    /// [`SeverityError::TransformationFailed`] carrying the underlying cause.
    /// Errors from persisting the preprocessor are returned unchanged.
    pub fn initiate(&self, train_df: &DataFrame, test_df: &DataFrame) -> Result<TransformedData> {
        let start = Instant::now();
        let (preprocessor, data) = self
            .run(train_df, test_df)
            .map_err(|e| SeverityError::TransformationFailed { source: Box::new(e) })?;

        self.store.save(&preprocessor, &data.preprocessor_path)?;

        info!(
            features = preprocessor.output_dim(),
            classes = data.classes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Data transformation complete"
        );
        Ok(data)
    }

    fn run(&self, train_df: &DataFrame, test_df: &DataFrame) -> Result<(Preprocessor, TransformedData)> {
        info!(
            train_rows = train_df.height(),
            test_rows = test_df.height(),
            "Starting data transformation"
        );

        let (train_features, train_labels) = self.schema.split_target(train_df)?;
        let (test_features, test_labels) = self.schema.split_target(test_df)?;

        let mut preprocessor = self.preprocessor();
        let train_x = preprocessor.fit_transform(&train_features)?;
        let test_x = preprocessor.transform(&test_features)?;

        let labels = LabelEncoder::fit([train_labels.as_slice(), test_labels.as_slice()]);
        let train_y = labels.encode(&train_labels)?;
        let test_y = labels.encode(&test_labels)?;

        let train = append_target(&train_x, &train_y)?;
        let test = append_target(&test_x, &test_y)?;

        let data = TransformedData {
            train,
            test,
            preprocessor_path: self.config.preprocessor_path(),
            classes: labels.classes().to_vec(),
            feature_names: preprocessor.feature_names(),
        };
        Ok((preprocessor, data))
    }
}

fn append_target(x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
    let target = y.view().insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[x.view(), target])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_encoder_sorted() {
        let train = vec!["Low".to_string(), "High".to_string()];
        let test = vec!["Medium".to_string()];
        let enc = LabelEncoder::fit([train.as_slice(), test.as_slice()]);

        assert_eq!(enc.classes(), &["High", "Low", "Medium"]);
        assert_eq!(enc.encode(&train).unwrap().to_vec(), vec![1.0, 0.0]);
        assert_eq!(enc.decode(2.0).unwrap(), "Medium");
        assert!(enc.decode(3.0).is_err());
    }

    #[test]
    fn test_split_xy() {
        let m = array![[1.0, 2.0, 0.0], [3.0, 4.0, 1.0]];
        let (x, y) = TransformedData::split_xy(&m).unwrap();
        assert_eq!(x, array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![0.0, 1.0]);
    }

    #[test]
    fn test_append_target() {
        let x = array![[1.0], [2.0]];
        let y = array![5.0, 6.0];
        assert_eq!(append_target(&x, &y).unwrap(), array![[1.0, 5.0], [2.0, 6.0]]);
    }
}
