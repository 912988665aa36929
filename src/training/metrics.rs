//! Classification metrics

use crate::error::{Result, SeverityError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Fraction of exactly matching class indices
pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report with accuracy, macro and support-weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Build the report over every class present in `y_true` or `y_pred`.
    ///
    /// Class indices are named through `class_names`; undefined precision or
    /// recall is reported as 0.
    pub fn new(y_true: &Array1<f64>, y_pred: &Array1<f64>, class_names: &[String]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(SeverityError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }

        let labels: BTreeSet<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|v| v.round() as i64)
            .collect();

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .map(|&label| {
                let mut tp = 0;
                let mut predicted = 0;
                let mut support = 0;
                for (t, p) in y_true.iter().zip(y_pred.iter()) {
                    let is_true = t.round() as i64 == label;
                    let is_pred = p.round() as i64 == label;
                    support += usize::from(is_true);
                    predicted += usize::from(is_pred);
                    tp += usize::from(is_true && is_pred);
                }
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                let name = usize::try_from(label)
                    .ok()
                    .and_then(|i| class_names.get(i).cloned())
                    .unwrap_or_else(|| label.to_string());
                ClassMetrics { label: name, precision, recall, f1_score, support }
            })
            .collect();

        let total: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n,
            support: total,
        };
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1_score, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, avg.support
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names() -> Vec<String> {
        vec!["Fatal".to_string(), "Minor".to_string(), "Serious".to_string()]
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&array![0.0, 1.0, 2.0, 1.0], &array![0.0, 1.0, 1.0, 1.0]), 0.75);
        assert_eq!(accuracy(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }

    #[test]
    fn test_report_values() {
        let y_true = array![0.0, 1.0, 2.0, 2.0];
        let y_pred = array![0.0, 2.0, 2.0, 1.0];
        let report = ClassificationReport::new(&y_true, &y_pred, &names()).unwrap();

        assert_eq!(report.classes.len(), 3);
        assert_eq!(report.classes[0].label, "Fatal");
        assert_eq!(report.classes[0].precision, 1.0);
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[2].support, 2);
        assert!((report.classes[2].recall - 0.5).abs() < 1e-12);
        assert_eq!(report.accuracy, 0.5);
        assert_eq!(report.weighted_avg.support, 4);
        assert!((report.macro_avg.recall - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_report_includes_predicted_only_class() {
        let report = ClassificationReport::new(&array![0.0, 0.0], &array![0.0, 1.0], &names()).unwrap();
        assert_eq!(report.classes.len(), 2);
        assert_eq!(report.classes[1].support, 0);
        assert_eq!(report.classes[1].recall, 0.0);
    }

    #[test]
    fn test_report_text_layout() {
        let report = ClassificationReport::new(&array![0.0, 1.0], &array![0.0, 1.0], &names()).unwrap();
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("precision"));
        assert!(lines[0].contains("support"));
        assert!(lines[2].trim_start().starts_with("Fatal"));
        assert!(text.contains("accuracy"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains("1.00"));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ClassificationReport::new(&array![0.0], &array![0.0, 1.0], &names()).is_err());
    }
}
