//! Decision tree implementation

use crate::error::{Result, SeverityError};
use super::models::{check_xy, encode_targets, unique_classes, Classifier};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        /// Class frequencies (classification only)
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    /// Parse a classification criterion name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gini" => Some(Criterion::Gini),
            "entropy" => Some(Criterion::Entropy),
            _ => None,
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
    /// Classes (for classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

/// Accumulated target statistics on one side of a split
#[derive(Clone)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl SideStats {
    fn new(n_classes: usize) -> Self {
        Self { count: 0, sum: 0.0, sq_sum: 0.0, class_counts: vec![0; n_classes] }
    }

    fn add(&mut self, value: f64, class: usize) {
        self.count += 1;
        self.sum += value;
        self.sq_sum += value * value;
        if let Some(c) = self.class_counts.get_mut(class) {
            *c += 1;
        }
    }

    fn remove(&mut self, value: f64, class: usize) {
        self.count -= 1;
        self.sum -= value;
        self.sq_sum -= value * value;
        if let Some(c) = self.class_counts.get_mut(class) {
            *c -= 1;
        }
    }
}

/// Training data shared while the tree grows
struct GrowContext<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    targets: Vec<usize>,
    n_classes: usize,
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Consider at most `n` randomly chosen features per split
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n);
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if self.is_classification && self.criterion == Criterion::MSE {
            return Err(SeverityError::InvalidParameter {
                name: "criterion".to_string(),
                value: "mse".to_string(),
                reason: "classification trees need gini or entropy".to_string(),
            });
        }

        self.n_features = n_features;

        let (targets, n_classes) = if self.is_classification {
            self.classes = unique_classes(y);
            (encode_targets(y, &self.classes), self.classes.len())
        } else {
            (vec![0; n_samples], 0)
        };

        let ctx = GrowContext { x, y, targets, n_classes };
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(0));
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(&ctx, &indices, 0, &mut importances, &mut rng));

        // Normalize feature importances
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn node_stats(&self, ctx: &GrowContext, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::new(ctx.n_classes);
        for &i in indices {
            stats.add(ctx.y[i], ctx.targets[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        ctx: &GrowContext,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.node_stats(ctx, indices);
        let impurity = self.impurity(&stats);

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(&stats);
        }

        let candidates = self.candidate_features(ctx.x.ncols(), rng);
        let Some((best_feature, best_threshold, gain)) = self.find_best_split(ctx, indices, &stats, &candidates) else {
            return self.make_leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best_feature]] <= best_threshold);

        importances[best_feature] += n_samples as f64 * gain;

        let left = Box::new(self.build_tree(ctx, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(ctx, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best_feature,
            threshold: best_threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut features: Vec<usize> = (0..n_features).collect();
        match self.max_features {
            Some(k) if k < n_features => {
                features.shuffle(rng);
                features.truncate(k.max(1));
                features.sort_unstable();
                features
            }
            _ => features,
        }
    }

    /// Best (feature, threshold, impurity decrease) over the candidate features
    fn find_best_split(
        &self,
        ctx: &GrowContext,
        indices: &[usize],
        parent: &SideStats,
        features: &[usize],
    ) -> Option<(usize, f64, f64)> {
        let parent_impurity = self.impurity(parent);
        let n = indices.len() as f64;

        // Parallelize feature scanning; each feature sweeps its sorted values once
        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut sorted: Vec<usize> = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    ctx.x[[a, feature_idx]]
                        .partial_cmp(&ctx.x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = SideStats::new(ctx.n_classes);
                let mut right = parent.clone();
                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for pos in 0..sorted.len() - 1 {
                    let idx = sorted[pos];
                    left.add(ctx.y[idx], ctx.targets[idx]);
                    right.remove(ctx.y[idx], ctx.targets[idx]);

                    let current = ctx.x[[idx, feature_idx]];
                    let next = ctx.x[[sorted[pos + 1], feature_idx]];
                    if next - current <= 1e-12 {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * self.impurity(&left)
                        + right.count as f64 * self.impurity(&right))
                        / n;
                    let gain = parent_impurity - weighted;
                    if gain > best_gain + 1e-12 {
                        best_gain = gain;
                        best_threshold = (current + next) / 2.0;
                    }
                }

                (best_gain > 0.0).then_some((feature_idx, best_threshold, best_gain))
            })
            .collect();

        // Lowest feature index wins ties
        let mut best: Option<(usize, f64, f64)> = None;
        for candidate in feature_results.into_iter().flatten() {
            if best.map_or(true, |b| candidate.2 > b.2 + 1e-12) {
                best = Some(candidate);
            }
        }
        best
    }

    fn impurity(&self, stats: &SideStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let n = stats.count as f64;
        match self.criterion {
            Criterion::Gini => {
                1.0 - stats
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -stats
                .class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.log2()
                })
                .sum::<f64>(),
            Criterion::MSE => (stats.sq_sum / n - (stats.sum / n).powi(2)).max(0.0),
        }
    }

    fn make_leaf(&self, stats: &SideStats) -> TreeNode {
        if self.is_classification {
            let n = stats.count.max(1) as f64;
            let distribution: Vec<f64> = stats.class_counts.iter().map(|&c| c as f64 / n).collect();
            // Most common class, smallest class on ties
            let best = super::models::argmax(stats.class_counts.iter().map(|&c| c as f64));
            TreeNode::Leaf {
                value: self.classes.get(best).copied().unwrap_or(0.0),
                distribution,
                n_samples: stats.count,
            }
        } else {
            TreeNode::Leaf {
                value: if stats.count > 0 { stats.sum / stats.count as f64 } else { 0.0 },
                distribution: Vec::new(),
                n_samples: stats.count,
            }
        }
    }

    fn leaf_for<'a>(&self, node: &'a TreeNode, sample: &[f64]) -> &'a TreeNode {
        match node {
            TreeNode::Leaf { .. } => node,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    self.leaf_for(left, sample)
                } else {
                    self.leaf_for(right, sample)
                }
            }
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(SeverityError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(SeverityError::ModelNotFitted)?;
        self.check_width(x)?;

        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                let sample = row.to_vec();
                match self.leaf_for(root, &sample) {
                    TreeNode::Leaf { value, .. } => *value,
                    TreeNode::Split { .. } => 0.0,
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Leaf class frequencies per row (classification only)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(SeverityError::ModelNotFitted)?;
        if !self.is_classification {
            return Err(SeverityError::TrainingError(
                "predict_proba is only available for classification".to_string(),
            ));
        }
        self.check_width(x)?;

        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            if let TreeNode::Leaf { distribution, .. } = self.leaf_for(root, &sample) {
                for (j, &p) in distribution.iter().enumerate().take(n_classes) {
                    proba[[i, j]] = p;
                }
            }
        }
        Ok(proba)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a lone leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + Self::node_depth(left).max(Self::node_depth(right)),
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => Self::count_leaves(left) + Self::count_leaves(right),
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTree::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTree::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        DecisionTree::predict_proba(self, x)
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
    fn test_classifier_simple() {
        let x = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_multiclass_entropy() {
        let x = array![[0.0], [0.1], [1.0], [1.1], [2.0], [2.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut tree = DecisionTree::new_classifier().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 3);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions.iter().zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>() / y.len() as f64;

        assert!(mse < 1e-9, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 1);
    }

    #[test]
    fn test_predict_proba_rows() {
        let x = array![[0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[3, 2]);
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-12);
        assert_eq!(proba[[2, 1]], 1.0);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_unfitted_predict() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(SeverityError::ModelNotFitted)));
    }
}
