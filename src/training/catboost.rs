//! CatBoost-style gradient boosting with symmetric trees
//!
//! Key features:
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Multi-class objective: every leaf holds one value per class
//! - Histogram split scoring over quantile borders

use crate::error::{Result, SeverityError};
use super::histogram::FeatureBins;
use super::models::{check_xy, encode_targets, proba_to_classes, softmax_rows, unique_classes, Classifier};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    /// Boosting iterations
    pub iterations: usize,
    pub learning_rate: f64,
    /// Symmetric tree depth
    pub depth: usize,
    pub reg_lambda: f64,
    pub subsample: f64,
    /// Borders per feature
    pub border_count: usize,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            reg_lambda: 3.0,
            subsample: 1.0,
            border_count: 64,
            random_state: Some(42),
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    /// 2^levels leaves, each with one value per class
    leaf_values: Vec<Vec<f64>>,
}

impl SymmetricTree {
    fn leaf_index(&self, sample: ArrayView1<f64>) -> usize {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        idx
    }

    fn predict(&self, sample: ArrayView1<f64>) -> &[f64] {
        let idx = self.leaf_index(sample).min(self.leaf_values.len().saturating_sub(1));
        &self.leaf_values[idx]
    }
}

/// Per-class gradients and hessians, row-major `[sample][class]`
struct ClassGradients {
    grad: Array2<f64>,
    hess: Array2<f64>,
}

fn build_symmetric_tree(
    bins: &FeatureBins,
    stats: &ClassGradients,
    indices: &[usize],
    depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let n_classes = stats.grad.ncols();
    let mut splits = Vec::with_capacity(depth);
    // Leaf id of every sampled row under the current levels
    let mut leaf_of: Vec<usize> = vec![0; indices.len()];
    let mut n_leaves = 1usize;

    for _level in 0..depth {
        let base_score = {
            let (g, h) = leaf_sums(stats, indices, &leaf_of, n_leaves);
            score(&g, &h, reg_lambda)
        };

        // Find best global split across all buckets (symmetric = same split for all)
        let candidates: Vec<Option<(usize, usize, f64)>> = (0..bins.n_features())
            .into_par_iter()
            .map(|feature| best_border(bins, stats, indices, &leaf_of, n_leaves, feature, reg_lambda))
            .collect();

        let mut best: Option<(usize, usize, f64)> = None;
        for c in candidates.into_iter().flatten() {
            if best.map_or(true, |b| c.2 > b.2) {
                best = Some(c);
            }
        }

        match best {
            Some((feature, border, gain)) if gain > base_score + 1e-12 => {
                for (pos, &i) in indices.iter().enumerate() {
                    leaf_of[pos] = leaf_of[pos] * 2 + usize::from(bins.bin(i, feature) > border);
                }
                n_leaves *= 2;
                splits.push((feature, bins.threshold(feature, border)));
            }
            _ => break,
        }
    }

    let (g, h) = leaf_sums(stats, indices, &leaf_of, n_leaves);
    let leaf_values = (0..n_leaves)
        .map(|leaf| {
            (0..n_classes)
                .map(|k| {
                    let idx = leaf * n_classes + k;
                    -g[idx] / (h[idx] + reg_lambda)
                })
                .collect()
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

/// Gradient and hessian totals per `(leaf, class)`
fn leaf_sums(
    stats: &ClassGradients,
    indices: &[usize],
    leaf_of: &[usize],
    n_leaves: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n_classes = stats.grad.ncols();
    let mut g = vec![0.0; n_leaves * n_classes];
    let mut h = vec![0.0; n_leaves * n_classes];
    for (pos, &i) in indices.iter().enumerate() {
        let base = leaf_of[pos] * n_classes;
        for k in 0..n_classes {
            g[base + k] += stats.grad[[i, k]];
            h[base + k] += stats.hess[[i, k]];
        }
    }
    (g, h)
}

fn score(g: &[f64], h: &[f64], reg_lambda: f64) -> f64 {
    g.iter().zip(h).map(|(&g, &h)| g * g / (h + reg_lambda)).sum()
}

/// Best border of one feature, scored over every current leaf and class
fn best_border(
    bins: &FeatureBins,
    stats: &ClassGradients,
    indices: &[usize],
    leaf_of: &[usize],
    n_leaves: usize,
    feature: usize,
    reg_lambda: f64,
) -> Option<(usize, usize, f64)> {
    let n_bins = bins.n_bins(feature);
    if n_bins < 2 {
        return None;
    }
    let n_classes = stats.grad.ncols();
    let stride = n_bins * n_classes;

    // hist[(leaf * n_bins + bin) * n_classes + class]
    let mut hist_g = vec![0.0; n_leaves * stride];
    let mut hist_h = vec![0.0; n_leaves * stride];
    for (pos, &i) in indices.iter().enumerate() {
        let base = leaf_of[pos] * stride + bins.bin(i, feature) * n_classes;
        for k in 0..n_classes {
            hist_g[base + k] += stats.grad[[i, k]];
            hist_h[base + k] += stats.hess[[i, k]];
        }
    }

    let mut totals_g = vec![0.0; n_leaves * n_classes];
    let mut totals_h = vec![0.0; n_leaves * n_classes];
    for leaf in 0..n_leaves {
        for b in 0..n_bins {
            for k in 0..n_classes {
                totals_g[leaf * n_classes + k] += hist_g[leaf * stride + b * n_classes + k];
                totals_h[leaf * n_classes + k] += hist_h[leaf * stride + b * n_classes + k];
            }
        }
    }

    let mut left_g = vec![0.0; n_leaves * n_classes];
    let mut left_h = vec![0.0; n_leaves * n_classes];
    let mut best: Option<(usize, usize, f64)> = None;

    for b in 0..n_bins - 1 {
        let mut gain = 0.0;
        for leaf in 0..n_leaves {
            for k in 0..n_classes {
                let t = leaf * n_classes + k;
                left_g[t] += hist_g[leaf * stride + b * n_classes + k];
                left_h[t] += hist_h[leaf * stride + b * n_classes + k];
                let right_g = totals_g[t] - left_g[t];
                let right_h = totals_h[t] - left_h[t];
                gain += left_g[t] * left_g[t] / (left_h[t] + reg_lambda)
                    + right_g * right_g / (right_h + reg_lambda);
            }
        }
        if best.map_or(true, |(_, _, g)| gain > g) {
            best = Some((feature, b, gain));
        }
    }
    best
}

/// CatBoost Classifier (MultiClass objective)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostClassifier {
    config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    classes: Vec<f64>,
    n_features: usize,
}

impl CatBoostClassifier {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn config(&self) -> &CatBoostConfig {
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

        let n = x.nrows();
        self.n_features = x.ncols();
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();
        let targets = encode_targets(y, &self.classes);
        self.trees.clear();
        if n_classes < 2 {
            return Ok(());
        }

        let bins = FeatureBins::new(x, self.config.border_count);
        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let mut raw = Array2::<f64>::zeros((n, n_classes));

        for _ in 0..self.config.iterations {
            let proba = softmax_rows(&raw);
            let grad = Array2::from_shape_fn((n, n_classes), |(i, k)| {
                proba[[i, k]] - if targets[i] == k { 1.0 } else { 0.0 }
            });
            let hess = proba.mapv(|p| (p * (1.0 - p)).max(1e-16));
            let stats = ClassGradients { grad, hess };

            let mut indices: Vec<usize> = (0..n).collect();
            if self.config.subsample < 1.0 {
                indices.shuffle(&mut rng);
                indices.truncate(((n as f64 * self.config.subsample).ceil() as usize).max(1));
                indices.sort_unstable();
            }

            let tree = build_symmetric_tree(&bins, &stats, &indices, self.config.depth, self.config.reg_lambda);
            for (i, row) in x.rows().into_iter().enumerate() {
                for (k, v) in tree.predict(row).iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * v;
                }
            }
            self.trees.push(tree);
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
            for tree in &self.trees {
                for (k, v) in tree.predict(row).iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * v;
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

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for CatBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        CatBoostClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        CatBoostClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        CatBoostClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }
}
