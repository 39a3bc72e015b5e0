//! Evaluation metrics for the held-out partition.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-class precision, recall and F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class label
    pub label: String,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN)
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Number of true rows of this class
    pub support: usize,
}

/// Classification report with confusion matrix.
///
/// `confusion[i][j]` counts rows of true class `i` predicted as class `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Metrics per class, in class index order
    pub classes: Vec<ClassMetrics>,
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// Unweighted mean precision over classes present in truth or predictions
    pub macro_precision: f64,
    /// Unweighted mean recall over the same classes
    pub macro_recall: f64,
    /// Unweighted mean F1 over the same classes
    pub macro_f1: f64,
    /// Confusion matrix
    pub confusion: Vec<Vec<usize>>,
    /// Number of evaluated rows
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Compare predictions against the truth.
    ///
    /// # Arguments
    /// * `y_true` - True class indices
    /// * `y_pred` - Predicted class indices
    /// * `labels` - Label of each class index
    ///
    /// # Errors
    /// [`ModelError::DimensionMismatch`] if the slices differ in length,
    /// [`ModelError::InvalidConfig`] if an index has no label.
    pub fn new(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::DimensionMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }

        let k = labels.len();
        let mut confusion = vec![vec![0usize; k]; k];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= k || p >= k {
                return Err(ModelError::InvalidConfig(format!(
                    "class index outside {} labels",
                    k
                )));
            }
            confusion[t][p] += 1;
        }

        let mut classes = Vec::with_capacity(k);
        let mut present = 0;
        let (mut sum_p, mut sum_r, mut sum_f) = (0.0, 0.0, 0.0);
        let mut correct = 0;

        for (i, label) in labels.iter().enumerate() {
            let tp = confusion[i][i];
            let support: usize = confusion[i].iter().sum();
            let predicted: usize = confusion.iter().map(|row| row[i]).sum();
            correct += tp;

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            if support > 0 || predicted > 0 {
                present += 1;
                sum_p += precision;
                sum_r += recall;
                sum_f += f1;
            }

            classes.push(ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            });
        }

        let mean = |sum: f64| if present == 0 { 0.0 } else { sum / present as f64 };
        Ok(Self {
            classes,
            accuracy: ratio(correct, y_true.len()),
            macro_precision: mean(sum_p),
            macro_recall: mean(sum_r),
            macro_f1: mean(sum_f),
            confusion,
            support: y_true.len(),
        })
    }

    /// Metrics for one label.
    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(0)
            .max("macro avg".len());

        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9}  {:>7}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9}  {:>9}  {:>9.2}  {:>7}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        writeln!(
            f,
            "{:>width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
            "macro avg", self.macro_precision, self.macro_recall, self.macro_f1, self.support
        )?;
        Ok(())
    }
}
