//! Column-wise preprocessing pipeline

use crate::error::{Result, SeverityError};
use crate::schema::FeatureSchema;
use super::{
    encoder::OneHotEncoder,
    imputer::{Imputer, ImputeStrategy},
    scaler::StandardScaler,
};
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Builds an unfitted [`Preprocessor`] from a feature schema
#[derive(Debug, Clone)]
pub struct PreprocessorBuilder {
    schema: FeatureSchema,
}

impl PreprocessorBuilder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    /// Numerical block: median imputation, then standard scaling.
    /// Categorical block: most-frequent imputation, one-hot encoding, then
    /// scaling without centering. Any other column is dropped.
    pub fn build(self) -> Preprocessor {
        Preprocessor {
            schema: self.schema,
            numeric_imputer: Imputer::new(ImputeStrategy::Median),
            numeric_scaler: StandardScaler::new(),
            categorical_imputer: Imputer::new(ImputeStrategy::MostFrequent),
            encoder: OneHotEncoder::new(),
            categorical_scaler: StandardScaler::new().with_mean(false),
            is_fitted: false,
            fit_time: None,
        }
    }
}

/// Fitted mapping from raw feature rows to fixed-length numeric vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    schema: FeatureSchema,
    numeric_imputer: Imputer,
    numeric_scaler: StandardScaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    categorical_scaler: StandardScaler,
    is_fitted: bool,
    /// Seconds spent in the last fit call
    fit_time: Option<f64>,
}

impl Preprocessor {
    /// Learn imputation, encoding and scaling statistics
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();
        let features = self.schema.validate(df)?;
        let numeric: Vec<&str> = self.schema.numerical.iter().map(|s| s.as_str()).collect();
        let categorical: Vec<&str> = self.schema.categorical.iter().map(|s| s.as_str()).collect();

        let imputed = self.numeric_imputer.fit_transform(&features, &numeric)?;
        let imputed = self.categorical_imputer.fit_transform(&imputed, &categorical)?;
        let numeric = self.numeric_imputer.columns().to_vec();
        let categorical: Vec<&str> = self.categorical_imputer.columns().iter().map(|s| s.as_str()).collect();

        let numeric_block = numeric_matrix(&imputed, &numeric)?;
        self.numeric_scaler.fit(&numeric_block)?;

        self.encoder.fit(&imputed, &categorical)?;
        let encoded = self.encoder.transform(&imputed)?;
        self.categorical_scaler.fit(&encoded)?;

        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());
        debug!(
            rows = df.height(),
            output_dim = self.output_dim(),
            "Fitted preprocessor"
        );
        Ok(self)
    }

    /// Map rows to the fitted feature space without refitting
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SeverityError::ModelNotFitted);
        }

        let features = self.schema.validate(df)?;

        let imputed = self.numeric_imputer.transform(&features)?;
        let imputed = self.categorical_imputer.transform(&imputed)?;

        let numeric_block = self
            .numeric_scaler
            .transform(&numeric_matrix(&imputed, self.numeric_imputer.columns())?)?;
        let categorical_block = self.categorical_scaler.transform(&self.encoder.transform(&imputed)?)?;

        Ok(concatenate(Axis(1), &[numeric_block.view(), categorical_block.view()])?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Width of every transformed row
    pub fn output_dim(&self) -> usize {
        self.numeric_imputer.columns().len() + self.encoder.output_dim()
    }

    /// Names of the transformed columns, in output order
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric_imputer
            .columns()
            .iter()
            .cloned()
            .chain(self.encoder.feature_names())
            .collect()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}

fn numeric_matrix<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((df.height(), columns.len()));
    for (j, name) in columns.iter().enumerate() {
        let name = name.as_ref();
        let column = df
            .column(name)
            .map_err(|_| SeverityError::FeatureNotFound(name.to_string()))?;
        let values = column.as_materialized_series().f64()?;
        for (i, v) in values.into_iter().enumerate() {
            out[[i, j]] = v.unwrap_or(f64::NAN);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "Latitude" => &[Some(10.0), None, Some(30.0), Some(20.0)],
            "Longitude" => &[1.0, 2.0, 3.0, 4.0],
            "Weather" => &[Some("Clear"), Some("Rainy"), None, Some("Clear")],
            "Road_Condition" => &["Dry", "Wet", "Dry", "Dry"],
            "Time_of_Day" => &["Morning", "Night", "Night", "Evening"],
            "Traffic" => &["Low", "High", "Low", "Low"],
            "Accident_Type" => &["Collision", "Collision", "Rollover", "Collision"],
            "Vehicle_Type" => &["Car", "Truck", "Car", "Bike"],
            "Accident_Reason" => &["Speeding", "Fatigue", "Speeding", "Weather"]
        )
        .unwrap()
    }

    #[test]
    fn test_output_dimensions() {
        let mut pre = PreprocessorBuilder::new(FeatureSchema::accident()).build();
        let out = pre.fit_transform(&frame()).unwrap();

        // 2 numeric + 2+2+3+2+2+3+3 indicators
        assert_eq!(pre.output_dim(), 19);
        assert_eq!(out.shape(), &[4, 19]);
        assert_eq!(pre.feature_names().len(), 19);
        assert_eq!(pre.feature_names()[2], "Weather_Clear");
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_numeric_block_is_standardized() {
        let mut pre = PreprocessorBuilder::new(FeatureSchema::accident()).build();
        let out = pre.fit_transform(&frame()).unwrap();

        let lon = out.column(1);
        let mean = lon.sum() / lon.len() as f64;
        let var = lon.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / lon.len() as f64;
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_feature_is_dropped() {
        let mut df = frame();
        df.with_column(Series::full_null("Latitude".into(), 4, &DataType::Float64)).unwrap();
        let mut pre = PreprocessorBuilder::new(FeatureSchema::accident()).build();
        let out = pre.fit_transform(&df).unwrap();

        assert_eq!(pre.output_dim(), 18);
        assert_eq!(out.shape(), &[4, 18]);
        assert_eq!(pre.feature_names()[0], "Longitude");
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let pre = PreprocessorBuilder::new(FeatureSchema::accident()).build();
        assert!(pre.transform(&frame()).is_err());
    }

    #[test]
    fn test_missing_column_fails_at_fit() {
        let mut pre = PreprocessorBuilder::new(FeatureSchema::accident()).build();
        let df = frame().drop("Traffic").unwrap();
        let err = pre.fit(&df).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
    }
}
