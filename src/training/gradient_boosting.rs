//! Gradient Boosting implementation
//!
//! Multi-class gradient boosted regression trees with a softmax link. Each
//! round fits one regression tree per class to the residual `y_k - p_k`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::models::{check_xy, encode_targets, proba_to_classes, softmax_rows, unique_classes, Classifier};
use crate::error::{Result, SeverityError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio per round
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// Trees per round, one per class
    trees: Vec<Vec<DecisionTree>>,
    initial_scores: Vec<f64>,
    classes: Vec<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_scores: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    /// Fit the boosted ensemble
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
        self.classes = unique_classes(y);
        let n_classes = self.classes.len();
        let targets = encode_targets(y, &self.classes);

        // Start from log class priors
        let mut counts = vec![0.0; n_classes];
        for &t in &targets {
            counts[t] += 1.0;
        }
        self.initial_scores = counts
            .iter()
            .map(|&c| (c / n_samples as f64).max(1e-12).ln())
            .collect();

        let mut raw = Array2::from_shape_fn((n_samples, n_classes), |(_, k)| self.initial_scores[k]);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        if n_classes < 2 {
            return Ok(());
        }

        for _ in 0..self.config.n_estimators {
            let proba = softmax_rows(&raw);
            let rows = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &rows);

            let mut round = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let residuals: Array1<f64> = rows
                    .iter()
                    .map(|&i| (if targets[i] == k { 1.0 } else { 0.0 }) - proba[[i, k]])
                    .collect();

                let mut tree = DecisionTree::new_regressor()
                    .with_max_depth(self.config.max_depth)
                    .with_min_samples_leaf(self.config.min_samples_leaf);
                tree.fit(&x_sub, &residuals)?;

                let update = tree.predict(x)?;
                raw.column_mut(k).scaled_add(self.config.learning_rate, &update);
                round.push(tree);
            }
            self.trees.push(round);
        }

        Ok(())
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample >= 1.0 {
            return indices;
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(SeverityError::ModelNotFitted);
        }
        let n_classes = self.classes.len();
        let mut raw = Array2::from_shape_fn((x.nrows(), n_classes), |(_, k)| self.initial_scores[k]);
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                let update = tree.predict(x)?;
                raw.column_mut(k).scaled_add(self.config.learning_rate, &update);
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

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        GradientBoostingClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> &[f64] {
        &self.classes
    }
}
