//! Classifier capability shared by every model family

use crate::error::{Result, SeverityError};
use ndarray::{Array1, Array2};

/// Common interface of the candidate classifiers.
///
/// Targets are class indices stored as `f64`. A fitted classifier only
/// predicts classes it saw during `fit`; `predict_proba` columns follow
/// [`Classifier::classes`].
pub trait Classifier: Send + Sync {
    /// Fit on features `x` and class-index targets `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict a class index per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Class membership probabilities, one column per fitted class
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Classes seen during fit, ascending
    fn classes(&self) -> &[f64];

    fn n_classes(&self) -> usize {
        self.classes().len()
    }

    /// Mean accuracy on `(x, y)`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let predictions = self.predict(x)?;
        Ok(super::metrics::accuracy(y, &predictions))
    }
}

/// Check that `x` and `y` agree and are non-empty
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SeverityError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(SeverityError::TrainingError("Empty dataset".to_string()));
    }
    Ok(())
}

/// Sorted distinct class values of `y`
pub(crate) fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().map(|v| v.round()).collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

/// Position of every target within `classes`
pub(crate) fn encode_targets(y: &Array1<f64>, classes: &[f64]) -> Vec<usize> {
    y.iter()
        .map(|&v| {
            let v = v.round();
            classes.iter().position(|&c| c == v).unwrap_or(0)
        })
        .collect()
}

/// Index of the largest value; the first one wins ties
pub(crate) fn argmax(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Map each probability row to the class of its maximum
pub(crate) fn proba_to_classes(proba: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| classes.get(argmax(row.iter().copied())).copied().unwrap_or(0.0))
        .collect()
}

/// Row-wise softmax of raw scores
pub(crate) fn softmax_rows(raw: &Array2<f64>) -> Array2<f64> {
    let mut out = raw.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unique_and_encode() {
        let y = array![2.0, 0.0, 2.0, 1.0];
        let classes = unique_classes(&y);
        assert_eq!(classes, vec![0.0, 1.0, 2.0]);
        assert_eq!(encode_targets(&y, &classes), vec![2, 0, 2, 1]);
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(vec![0.2, 0.4, 0.4]), 1);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let p = softmax_rows(&array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]]);
        for row in p.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((p[[1, 0]] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_xy_mismatch() {
        let x = Array2::<f64>::zeros((3, 2));
        let y = array![0.0, 1.0];
        assert!(check_xy(&x, &y).is_err());
    }
}
