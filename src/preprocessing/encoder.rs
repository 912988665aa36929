//! One-hot encoding of categorical columns

use crate::error::{Result, SeverityError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder with sorted categories.
///
/// Values not seen during fit encode to an all-zero block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the category vocabulary of each column
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.categories.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| SeverityError::FeatureNotFound(col_name.to_string()))?;
            let text = column.as_materialized_series().cast(&DataType::String)?;
            let seen: BTreeSet<String> = text
                .str()?
                .into_iter()
                .flatten()
                .map(|s| s.to_string())
                .collect();
            self.categories.push((col_name.to_string(), seen.into_iter().collect()));
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode the fitted columns into a dense indicator matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(SeverityError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.output_dim()));
        let mut offset = 0;
        for (col_name, categories) in &self.categories {
            let column = df
                .column(col_name)
                .map_err(|_| SeverityError::FeatureNotFound(col_name.clone()))?;
            let text = column.as_materialized_series().cast(&DataType::String)?;
            for (row, value) in text.str()?.into_iter().enumerate() {
                let hit = value.and_then(|v| categories.binary_search_by(|c| c.as_str().cmp(v)).ok());
                if let Some(idx) = hit {
                    out[[row, offset + idx]] = 1.0;
                }
            }
            offset += categories.len();
        }
        Ok(out)
    }

    /// Total number of indicator columns
    pub fn output_dim(&self) -> usize {
        self.categories.iter().map(|(_, c)| c.len()).sum()
    }

    /// Indicator names as `<column>_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(col, cats)| cats.iter().map(move |c| format!("{}_{}", col, c)))
            .collect()
    }

    /// Learned categories per column
    pub fn categories(&self) -> &[(String, Vec<String>)] {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_categories() {
        let df = df!("w" => &["Rainy", "Clear", "Foggy", "Clear"]).unwrap();
        let mut enc = OneHotEncoder::new();
        enc.fit(&df, &["w"]).unwrap();

        assert_eq!(enc.feature_names(), vec!["w_Clear", "w_Foggy", "w_Rainy"]);
        let out = enc.transform(&df).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let train = df!("w" => &["Rainy", "Clear"]).unwrap();
        let test = df!("w" => &["Snow"]).unwrap();
        let mut enc = OneHotEncoder::new();
        enc.fit(&train, &["w"]).unwrap();

        let out = enc.transform(&test).unwrap();
        assert_eq!(out.shape(), &[1, 2]);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
