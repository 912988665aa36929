//! Missing value imputation

use crate::error::{Result, SeverityError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Column median (numeric only)
    Median,
    /// Most frequent value; ties go to the smallest value
    MostFrequent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    Text(String),
}

/// Per-column imputer learned on training data.
///
/// A column with no observed values at fit time is dropped from the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    columns: Vec<String>,
    #[serde(default)]
    dropped: Vec<String>,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            columns: Vec::new(),
            dropped: Vec::new(),
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Columns kept by the last fit, in input order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Columns dropped by the last fit for having no observed values
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Fit the imputer to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.fill_values.clear();
        self.columns.clear();
        self.dropped.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| SeverityError::FeatureNotFound(col_name.to_string()))?;
            match self.compute_fill_value(column.as_materialized_series())? {
                Some(fill_value) => {
                    self.columns.push(col_name.to_string());
                    self.fill_values.insert(col_name.to_string(), fill_value);
                }
                None => {
                    warn!(column = %col_name, "Dropping feature with no observed values");
                    self.dropped.push(col_name.to_string());
                }
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing values in the fitted columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(SeverityError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let column = df
                .column(col_name)
                .map_err(|_| SeverityError::FeatureNotFound(col_name.clone()))?;
            let fill_value = self
                .fill_values
                .get(col_name)
                .ok_or(SeverityError::ModelNotFitted)?;
            let filled = fill_series(column.as_materialized_series(), fill_value)?;
            result.with_column(filled)?;
        }
        for col_name in &self.dropped {
            if result.column(col_name).is_ok() {
                result = result.drop(col_name)?;
            }
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_fill_value(&self, series: &Series) -> Result<Option<ImputeValue>> {
        match self.strategy {
            ImputeStrategy::Median => {
                let values: Vec<f64> = series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .flatten()
                    .filter(|v| !v.is_nan())
                    .collect();
                Ok(median(&values).map(ImputeValue::Numeric))
            }
            ImputeStrategy::MostFrequent => {
                let mut counts: BTreeMap<String, usize> = BTreeMap::new();
                let text = series.cast(&DataType::String)?;
                for value in text.str()?.into_iter().flatten() {
                    if !value.trim().is_empty() {
                        *counts.entry(value.to_string()).or_insert(0) += 1;
                    }
                }
                // BTreeMap iterates in ascending order, so the first maximum is the smallest value
                let mut best: Option<(String, usize)> = None;
                for (value, count) in counts {
                    if best.as_ref().map_or(true, |(_, c)| count > *c) {
                        best = Some((value, count));
                    }
                }
                Ok(best.map(|(value, _)| ImputeValue::Text(value)))
            }
        }
    }
}

fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
    let name = series.name().clone();
    match fill_value {
        ImputeValue::Numeric(fill) => {
            let values: Vec<f64> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(x) if !x.is_nan() => x,
                    _ => *fill,
                })
                .collect();
            Ok(Series::new(name, values))
        }
        ImputeValue::Text(fill) => {
            let values: Vec<String> = series
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| match v {
                    Some(s) if !s.trim().is_empty() => s.to_string(),
                    _ => fill.clone(),
                })
                .collect();
            Ok(Series::new(name, values))
        }
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_imputation() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0), Some(10.0)]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit_transform(&df, &["a"]).unwrap();

        let values: Vec<f64> = out.column("a").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![1.0, 3.0, 3.0, 10.0]);
    }

    #[test]
    fn test_most_frequent_tie_takes_smallest() {
        let df = df!("w" => &[Some("Rainy"), Some("Clear"), None, Some("Rainy"), Some("Clear")]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let out = imputer.fit_transform(&df, &["w"]).unwrap();

        let values: Vec<&str> = out.column("w").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(values[2], "Clear");
    }

    #[test]
    fn test_uses_training_statistics() {
        let train = df!("a" => &[Some(2.0), Some(4.0)]).unwrap();
        let test = df!("a" => &[None, Some(100.0), Some(200.0)]).unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        imputer.fit(&train, &["a"]).unwrap();
        let out = imputer.transform(&test).unwrap();

        let first = out.column("a").unwrap().f64().unwrap().get(0);
        assert_eq!(first, Some(3.0));
    }

    #[test]
    fn test_unfitted_transform_fails() {
        let df = df!("a" => &[1.0]).unwrap();
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(imputer.transform(&df), Err(SeverityError::ModelNotFitted)));
    }

    #[test]
    fn test_all_missing_column_is_dropped() {
        let df = df!(
            "a" => &[None::<f64>, None],
            "b" => &[Some(1.0), None]
        )
        .unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit_transform(&df, &["a", "b"]).unwrap();

        assert_eq!(imputer.columns(), &["b".to_string()]);
        assert_eq!(imputer.dropped(), &["a".to_string()]);
        assert!(out.column("a").is_err());
        let values: Vec<f64> = out.column("b").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![1.0, 1.0]);
    }
}
