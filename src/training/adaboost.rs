//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost builds an ensemble of weak learners (decision stumps), weighting
//! misclassified samples more heavily in subsequent rounds.

use crate::error::{Result, SeverityError};
use super::models::{argmax, check_xy, encode_targets, softmax_rows, unique_classes, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Class position when feature <= threshold
    left: usize,
    /// Class position when feature > threshold
    right: usize,
}

impl Stump {
    fn predict_sample(&self, sample: ArrayView1<f64>) -> usize {
        if sample[self.feature_index] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

/// AdaBoost Classifier (SAMME variant, supports multi-class)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Find the weighted-error minimizing stump with one sorted sweep per feature
    fn fit_stump(x: &Array2<f64>, targets: &[usize], weights: &[f64], n_classes: usize) -> Stump {
        let mut totals = vec![0.0; n_classes];
        for (&t, &w) in targets.iter().zip(weights) {
            totals[t] += w;
        }
        let majority = argmax(totals.iter().copied());

        let per_feature: Vec<Option<(f64, Stump)>> = (0..x.ncols())
            .into_par_iter()
            .map(|f| {
                let col = x.column(f);
                let mut order: Vec<usize> = (0..x.nrows()).collect();
                order.sort_by(|&a, &b| col[a].partial_cmp(&col[b]).unwrap_or(std::cmp::Ordering::Equal));

                let mut left = vec![0.0; n_classes];
                let mut best: Option<(f64, Stump)> = None;
                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    left[targets[i]] += weights[i];
                    let (v, next) = (col[i], col[order[pos + 1]]);
                    if next <= v {
                        continue;
                    }

                    let right: Vec<f64> = totals.iter().zip(&left).map(|(t, l)| t - l).collect();
                    let l_label = argmax(left.iter().copied());
                    let r_label = argmax(right.iter().copied());
                    let error = totals.iter().sum::<f64>() - left[l_label] - right[r_label];

                    if best.as_ref().map_or(true, |(e, _)| error < *e) {
                        best = Some((
                            error,
                            Stump { feature_index: f, threshold: (v + next) / 2.0, left: l_label, right: r_label },
                        ));
                    }
                }
                best
            })
            .collect();

        let mut best_error = f64::MAX;
        let mut best_stump = Stump { feature_index: 0, threshold: f64::INFINITY, left: majority, right: majority };
        for (error, stump) in per_feature.into_iter().flatten() {
            if error < best_error {
                best_error = error;
                best_stump = stump;
            }
        }
        best_stump
    }

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
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();
        let targets = encode_targets(y, &self.classes);
        let mut weights = vec![1.0 / n_samples as f64; n_samples];

        self.stumps.clear();
        self.alphas.clear();

        if n_classes < 2 {
            self.stumps.push(Stump { feature_index: 0, threshold: f64::INFINITY, left: 0, right: 0 });
            self.alphas.push(1.0);
            return Ok(self);
        }

        for _round in 0..self.n_estimators {
            let stump = Self::fit_stump(x, &targets, &weights, n_classes);
            let missed: Vec<bool> = x
                .rows()
                .into_iter()
                .zip(&targets)
                .map(|(row, &t)| stump.predict_sample(row) != t)
                .collect();

            let missed_weight: f64 = weights
                .iter()
                .zip(&missed)
                .filter_map(|(w, m)| if *m { Some(*w) } else { None })
                .sum();
            let error = missed_weight / weights.iter().sum::<f64>();

            // Perfect fit: keep the stump and stop
            if error <= 1e-15 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance for K classes
            if error >= 1.0 - 1.0 / n_classes as f64 {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            // SAMME alpha for multi-class
            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes as f64 - 1.0).ln());

            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let w_sum: f64 = weights.iter().sum();
            if w_sum > 0.0 {
                weights.iter_mut().for_each(|w| *w /= w_sum);
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(self)
    }

    /// Alpha-weighted class votes per row
    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.stumps.is_empty() {
            return Err(SeverityError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(SeverityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut scores = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
                scores[[i, stump.predict_sample(row)]] += alpha;
            }
        }
        Ok(scores)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_scores(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(row.iter().copied())])
            .collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut scores = self.decision_scores(x)?;
        let total: f64 = self.alphas.iter().sum();
        let scale = (self.classes.len() as f64 - 1.0).max(1.0) * total.max(f64::EPSILON);
        scores.mapv_inplace(|s| s / scale);
        Ok(softmax_rows(&scores))
    }

    /// Share of alpha carried by each feature's stumps
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() || self.n_features == 0 {
            return None;
        }
        let mut imp = Array1::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            if stump.threshold.is_finite() {
                imp[stump.feature_index] += alpha;
            }
        }
        let total = imp.sum();
        if total > 0.0 {
            imp /= total;
        }
        Some(imp)
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        AdaBoostClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }
}
