//! Quantile binning for histogram-based boosting
//!
//! Features are cut into at most `max_bins` bins once per fit. A sample
//! falls in bin `b` when its value is `<= thresholds[b]` and greater than
//! every earlier threshold, so "bin <= b" and "value <= thresholds[b]"
//! select the same rows at train and predict time.

use ndarray::Array2;

pub(crate) struct FeatureBins {
    thresholds: Vec<Vec<f64>>,
    binned: Array2<u16>,
}

impl FeatureBins {
    pub(crate) fn new(x: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let thresholds: Vec<Vec<f64>> = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut values: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                cut_points(&values, max_bins)
            })
            .collect();

        let binned = Array2::from_shape_fn(x.dim(), |(i, j)| bin_of(&thresholds[j], x[[i, j]]));
        Self { thresholds, binned }
    }

    /// Number of bins of a feature
    pub(crate) fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }

    pub(crate) fn bin(&self, row: usize, feature: usize) -> usize {
        self.binned[[row, feature]] as usize
    }

    /// Raw-value threshold that closes bin `b`
    pub(crate) fn threshold(&self, feature: usize, b: usize) -> f64 {
        self.thresholds[feature][b]
    }

    pub(crate) fn n_features(&self) -> usize {
        self.thresholds.len()
    }
}

fn cut_points(sorted: &[f64], max_bins: usize) -> Vec<f64> {
    let mut unique = sorted.to_vec();
    unique.dedup();
    if unique.len() < 2 {
        return Vec::new();
    }

    if unique.len() <= max_bins {
        return unique.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    // Quantile cuts over the full (duplicated) distribution
    let n = sorted.len();
    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|q| {
            let pos = (q * n) / max_bins;
            let lo = sorted[pos.saturating_sub(1)];
            let hi = sorted[pos.min(n - 1)];
            (lo + hi) / 2.0
        })
        .collect();
    cuts.dedup();
    cuts
}

fn bin_of(thresholds: &[f64], value: f64) -> u16 {
    thresholds.partition_point(|&t| t < value) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_feature_has_one_cut() {
        let x = array![[0.0], [1.0], [1.0], [0.0]];
        let bins = FeatureBins::new(&x, 16);
        assert_eq!(bins.n_bins(0), 2);
        assert_eq!(bins.threshold(0, 0), 0.5);
        assert_eq!(bins.bin(0, 0), 0);
        assert_eq!(bins.bin(1, 0), 1);
    }

    #[test]
    fn test_bin_matches_threshold_rule() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| (i % 37) as f64);
        let bins = FeatureBins::new(&x, 8);
        for i in 0..100 {
            let b = bins.bin(i, 0);
            if b < bins.n_bins(0) - 1 {
                assert!(x[[i, 0]] <= bins.threshold(0, b));
            }
            if b > 0 {
                assert!(x[[i, 0]] > bins.threshold(0, b - 1));
            }
        }
        assert!(bins.n_bins(0) <= 8);
    }

    #[test]
    fn test_constant_feature_single_bin() {
        let x = array![[3.0], [3.0]];
        let bins = FeatureBins::new(&x, 8);
        assert_eq!(bins.n_bins(0), 1);
        assert_eq!(bins.n_features(), 1);
    }
}
