//! Cross-validation implementations

use crate::error::{Result, SeverityError};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits, .. } | CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize, y: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(SeverityError::InvalidParameter {
                name: "n_splits".to_string(),
                value: n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(SeverityError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let test_folds = match &self.strategy {
            CVStrategy::KFold { shuffle, .. } => self.k_fold_assignment(n_samples, n_splits, *shuffle),
            CVStrategy::StratifiedKFold { shuffle, .. } => {
                let y = y.ok_or_else(|| {
                    SeverityError::DataError("StratifiedKFold requires target array".to_string())
                })?;
                if y.len() != n_samples {
                    return Err(SeverityError::ShapeError {
                        expected: format!("y length = {}", n_samples),
                        actual: format!("y length = {}", y.len()),
                    });
                }
                self.stratified_assignment(y, n_splits, *shuffle)?
            }
        };

        Ok(splits_from_assignment(&test_folds, n_splits))
    }

    fn rng(&self) -> ChaCha8Rng {
        match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Contiguous folds; the first `n % k` folds get one extra sample
    fn k_fold_assignment(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            indices.shuffle(&mut self.rng());
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut test_folds = vec![0; n_samples];
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            for &i in &indices[current..current + fold_size] {
                test_folds[i] = fold_idx;
            }
            current += fold_size;
        }
        test_folds
    }

    /// Fold of every sample, keeping each class's share per fold balanced.
    ///
    /// Classes are ordered by first appearance. Folds are allocated by dealing
    /// the class-sorted labels round-robin, then each class fills its folds in
    /// sample order.
    fn stratified_assignment(&self, y: &Array1<f64>, n_splits: usize, shuffle: bool) -> Result<Vec<usize>> {
        let mut first_seen: Vec<i64> = Vec::new();
        let encoded: Vec<usize> = y
            .iter()
            .map(|v| {
                let class = v.round() as i64;
                match first_seen.iter().position(|&c| c == class) {
                    Some(k) => k,
                    None => {
                        first_seen.push(class);
                        first_seen.len() - 1
                    }
                }
            })
            .collect();
        let n_classes = first_seen.len();

        let mut counts = vec![0usize; n_classes];
        for &k in &encoded {
            counts[k] += 1;
        }
        let max_count = counts.iter().copied().max().unwrap_or(0);
        if n_splits > max_count {
            return Err(SeverityError::DataError(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                n_splits
            )));
        }
        let min_count = counts.iter().copied().min().unwrap_or(0);
        if min_count < n_splits {
            warn!(
                "The least populated class has only {} members, which is less than n_splits={}",
                min_count, n_splits
            );
        }

        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; n_classes]; n_splits];
        for (pos, &k) in sorted.iter().enumerate() {
            allocation[pos % n_splits][k] += 1;
        }

        let mut rng = self.rng();
        let mut test_folds = vec![0; y.len()];
        for k in 0..n_classes {
            let mut folds_for_class: Vec<usize> = (0..n_splits)
                .flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][k]))
                .collect();
            if shuffle {
                folds_for_class.shuffle(&mut rng);
            }
            let members = encoded.iter().enumerate().filter(|&(_, &c)| c == k).map(|(i, _)| i);
            for (i, fold) in members.zip(folds_for_class) {
                test_folds[i] = fold;
            }
        }
        Ok(test_folds)
    }
}

fn splits_from_assignment(test_folds: &[usize], n_splits: usize) -> Vec<CVSplit> {
    (0..n_splits)
        .map(|fold_idx| {
            let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                (0..test_folds.len()).partition(|&i| test_folds[i] == fold_idx);
            CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            }
        })
        .collect()
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = if n_folds == 0 {
            0.0
        } else {
            scores.iter().sum::<f64>() / n_folds as f64
        };
        let variance = if n_folds == 0 {
            0.0
        } else {
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64
        };

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 5, shuffle: false });
        let splits = cv.split(100, None).unwrap();

        assert_eq!(splits.len(), 5);

        // Each test set should have 20 samples
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        // All indices should be covered exactly once in test sets
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 3, shuffle: false });
        let splits = cv.split(7, None).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2]);
        assert_eq!(splits[1].test_indices, vec![3, 4]);
        assert_eq!(splits[2].test_indices, vec![5, 6]);
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // 5 samples of class 0
            1.0, 1.0, 1.0, 1.0, 1.0, // 5 samples of class 1
        ]);

        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: false });
        let splits = cv.split(10, Some(&y)).unwrap();

        assert_eq!(splits.len(), 5);

        // Each fold should have 1 sample from each class
        for (fold, split) in splits.iter().enumerate() {
            assert_eq!(split.test_indices, vec![fold, fold + 5]);
            assert_eq!(split.train_indices.len(), 8);
        }
    }

    #[test]
    fn test_stratified_keeps_class_order_of_samples() {
        let y = Array1::from_vec(vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 2, shuffle: false });
        let splits = cv.split(7, Some(&y)).unwrap();

        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        for split in &splits {
            let ones = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(ones, 2);
        }
    }

    #[test]
    fn test_stratified_requires_target() {
        let cv = CrossValidator::new(CVStrategy::default());
        assert!(cv.split(10, None).is_err());
    }

    #[test]
    fn test_too_many_splits() {
        let y = Array1::from_vec(vec![0.0, 1.0, 0.0, 1.0]);
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: false });
        assert!(cv.split(4, Some(&y)).is_err());
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits: 1, shuffle: false });
        assert!(cv.split(4, None).is_err());
    }

    #[test]
    fn test_cv_results() {
        let results = CVResults::from_scores(vec![0.5, 1.0]);
        assert_eq!(results.mean_score, 0.75);
        assert_eq!(results.std_score, 0.25);
        assert_eq!(results.n_folds, 2);
    }
}
