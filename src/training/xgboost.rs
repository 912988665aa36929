//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from standard gradient boosting:
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Histogram split finding over quantile bins
//! - Multi-class softmax objective with one tree per class per round

use crate::error::{Result, SeverityError};
use super::histogram::FeatureBins;
use super::models::{check_xy, encode_targets, proba_to_classes, softmax_rows, unique_classes, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Histogram bins per feature
    pub max_bins: usize,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            max_bins: 256,
            random_state: Some(42),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Gradient statistics of one tree fit
struct GradPair<'a> {
    grad: &'a [f64],
    hess: &'a [f64],
}

/// Build an XGBoost tree level by level using histogram split finding
fn build_xgb_tree(
    bins: &FeatureBins,
    stats: &GradPair,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let g_sum: f64 = indices.iter().map(|&i| stats.grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| stats.hess[i]).sum();
    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    // Stopping conditions
    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    let candidates: Vec<Option<(usize, usize, f64)>> = feature_indices
        .par_iter()
        .map(|&f| find_best_split_for_feature(bins, stats, indices, f, g_sum, h_sum, config))
        .collect();

    // Lowest feature index wins ties
    let mut best: Option<(usize, usize, f64)> = None;
    for c in candidates.into_iter().flatten() {
        if best.map_or(true, |b| c.2 > b.2) {
            best = Some(c);
        }
    }

    match best {
        Some((feature, bin, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| bins.bin(i, feature) <= bin);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(bins, stats, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(bins, stats, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold: bins.threshold(feature, bin),
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Best (feature, bin, gain) for a single feature from its gradient histogram
fn find_best_split_for_feature(
    bins: &FeatureBins,
    stats: &GradPair,
    indices: &[usize],
    feature: usize,
    g_total: f64,
    h_total: f64,
    config: &XGBoostConfig,
) -> Option<(usize, usize, f64)> {
    let n_bins = bins.n_bins(feature);
    if n_bins < 2 {
        return None;
    }

    let mut hist_g = vec![0.0; n_bins];
    let mut hist_h = vec![0.0; n_bins];
    for &i in indices {
        let b = bins.bin(i, feature);
        hist_g[b] += stats.grad[i];
        hist_h[b] += stats.hess[i];
    }

    let lambda = config.reg_lambda;
    let parent = (g_total * g_total) / (h_total + lambda);
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<(usize, usize, f64)> = None;

    for b in 0..n_bins - 1 {
        g_left += hist_g[b];
        h_left += hist_h[b];
        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        // Min child weight check
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        // XGBoost gain formula
        let gain = 0.5
            * ((g_left * g_left) / (h_left + lambda) + (g_right * g_right) / (h_right + lambda) - parent);

        if best.map_or(true, |(_, _, g)| gain > g) {
            best = Some((feature, b, gain));
        }
    }
    best
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if ratio >= 1.0 {
        return indices;
    }
    let k = ((n as f64 * ratio).ceil() as usize).max(1);
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

/// XGBoost Classifier (softmax objective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// Trees per round, one per class
    trees: Vec<Vec<XGBNode>>,
    classes: Vec<f64>,
    n_features: usize,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.config.learning_rate <= 0.0 {
            return Err(SeverityError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.config.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();
        let targets = encode_targets(y, &self.classes);
        self.trees.clear();
        if n_classes < 2 {
            return Ok(());
        }

        let bins = FeatureBins::new(x, self.config.max_bins);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let mut raw = Array2::<f64>::zeros((n_samples, n_classes));

        for _ in 0..self.config.n_estimators {
            let proba = softmax_rows(&raw);
            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, bins.n_features(), self.config.colsample_bytree);

            // Softmax gradient and hessian per class; class trees are independent
            let round: Vec<XGBNode> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let grad: Vec<f64> = (0..n_samples)
                        .map(|i| proba[[i, k]] - if targets[i] == k { 1.0 } else { 0.0 })
                        .collect();
                    let hess: Vec<f64> = (0..n_samples)
                        .map(|i| (2.0 * proba[[i, k]] * (1.0 - proba[[i, k]])).max(1e-16))
                        .collect();
                    let stats = GradPair { grad: &grad, hess: &hess };
                    build_xgb_tree(&bins, &stats, &row_indices, &col_indices, 0, &self.config)
                })
                .collect();

            for (k, tree) in round.iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
            }
            self.trees.push(round);
        }

        Ok(())
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(SeverityError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(SeverityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let mut raw = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for round in &self.trees {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(row);
                }
            }
        }
        Ok(raw)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(softmax_rows(&self.raw_scores(x)?))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(proba_to_classes(&self.predict_proba(x)?, &self.classes))
    }

    /// Split-count feature importances
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }
        let mut counts = vec![0.0f64; self.n_features];
        for tree in self.trees.iter().flatten() {
            xgb_count_splits(tree, &mut counts);
        }
        let total: f64 = counts.iter().sum();
        if total > 0.0 {
            for c in counts.iter_mut() {
                *c /= total;
            }
        }
        Some(Array1::from_vec(counts))
    }
}

fn xgb_count_splits(node: &XGBNode, counts: &mut [f64]) {
    if let XGBNode::Split { feature, left, right, .. } = node {
        if *feature < counts.len() {
            counts[*feature] += 1.0;
        }
        xgb_count_splits(left, counts);
        xgb_count_splits(right, counts);
    }
}

impl Classifier for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        XGBoostClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        XGBoostClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        XGBoostClassifier::predict_proba(self, x)
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
    fn test_leaf_weight_l1() {
        assert_eq!(compute_leaf_weight(0.5, 1.0, 1.0, 1.0), 0.0);
        assert!((compute_leaf_weight(3.0, 1.0, 1.0, 1.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_multiclass_fit() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { (i / 10) as f64 + (i % 10) as f64 * 0.01 } else { 0.0 });
        let y: Array1<f64> = (0..30).map(|i| (i / 10) as f64).collect();

        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 20,
            learning_rate: 0.3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let importances = model.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_binary_probabilities() {
        let x = array![[0.0], [0.1], [0.2], [1.0], [1.1], [1.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 10,
            min_child_weight: 0.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[5, 1]] > 0.5);
    }

    #[test]
    fn test_predict_unfitted() {
        let model = XGBoostClassifier::new(XGBoostConfig::default());
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
