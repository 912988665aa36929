//! Linear model implementations

use crate::error::{Result, SeverityError};
use super::models::{check_xy, encode_targets, proba_to_classes, softmax_rows, unique_classes, Classifier};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Multinomial logistic regression fitted by batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, one column per class
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    pub intercept: Option<Array1<f64>>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    classes: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
            classes: Vec::new(),
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Fit the model using gradient descent on the softmax cross-entropy
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(SeverityError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();
        let targets = encode_targets(y, &self.classes);

        let mut one_hot = Array2::<f64>::zeros((n_samples, n_classes));
        for (i, &t) in targets.iter().enumerate() {
            one_hot[[i, t]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((n_features, n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let lr = self.learning_rate;

        for _iter in 0..self.max_iter {
            // Forward pass
            let linear = x.dot(&weights) + &bias;
            let predictions = softmax_rows(&linear);

            // Compute gradients
            let errors = &predictions - &one_hot;
            let dw = x.t().dot(&errors) / n_samples as f64 + self.alpha * &weights;
            let db = if self.fit_intercept {
                errors.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_classes))
            } else {
                Array1::zeros(n_classes)
            };

            // Check convergence
            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias.scaled_add(-lr, &db);
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);

        Ok(self)
    }

    /// Predict class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, &self.intercept) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(SeverityError::ModelNotFitted),
        };
        if x.ncols() != coefficients.nrows() {
            return Err(SeverityError::ShapeError {
                expected: format!("{} features", coefficients.nrows()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let linear = x.dot(coefficients) + intercept;
        Ok(softmax_rows(&linear))
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba_to_classes(&proba, &self.classes))
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        LogisticRegression::predict_proba(self, x)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![
            [-2.0, -1.0],
            [-1.5, -1.0],
            [-1.0, -0.5],
            [1.0, 0.5],
            [1.5, 1.0],
            [2.0, 1.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new()
            .with_max_iter(1000)
            .with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.score(&x, &y).unwrap() > 0.99);
    }

    #[test]
    fn test_multiclass_probabilities() {
        let x = array![[-3.0], [-2.5], [0.0], [0.2], [3.0], [2.5]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut model = LogisticRegression::new().with_max_iter(2000).with_learning_rate(0.5).with_alpha(0.0);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[6, 3]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(SeverityError::ModelNotFitted)));
    }
}
