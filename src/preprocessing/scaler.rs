//! Standard scaling over dense feature blocks

use crate::error::{Result, SeverityError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaler: (x - mean) / std, population std.
///
/// With `with_mean = false` only the division is applied, which keeps
/// one-hot blocks sparse-friendly. Zero-variance columns keep scale 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    with_mean: bool,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            with_mean: true,
            mean: None,
            scale: None,
        }
    }

    /// Toggle centering
    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    /// Learn per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(SeverityError::DataError("cannot fit scaler on zero rows".to_string()));
        }

        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, &m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
                let std = var.sqrt();
                if std > f64::EPSILON * 10.0 { std } else { 1.0 }
            })
            .collect::<Array1<f64>>();

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Apply the learned statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(SeverityError::ModelNotFitted),
        };

        if x.ncols() != scale.len() {
            return Err(SeverityError::ShapeError {
                expected: format!("{} columns", scale.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.to_owned();
        for (mut col, (&m, &s)) in out.axis_iter_mut(Axis(1)).zip(mean.iter().zip(scale.iter())) {
            let center = if self.with_mean { m } else { 0.0 };
            col.mapv_inplace(|v| (v - center) / s);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&x).unwrap();

        assert!((out[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((out[[1, 0]] - 1.0).abs() < 1e-12);
        // constant column: centered, scale 1
        assert_eq!(out[[0, 1]], 0.0);
    }

    #[test]
    fn test_without_mean_only_divides() {
        let x = array![[0.0], [1.0], [0.0], [1.0]];
        let mut scaler = StandardScaler::new().with_mean(false);
        let out = scaler.fit_transform(&x).unwrap();

        assert_eq!(out[[0, 0]], 0.0);
        assert!((out[[1, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_column_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }
}
