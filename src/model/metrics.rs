//! Validation metrics: accuracy and a per-stage classification report.
use std::fmt;

use anyhow::{bail, Result};
use ndarray::Array2;
use serde::Serialize;

use crate::labels::SleepStage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class_id: usize,
    /// Display label (`W`, `1`, `2`, `3/4`, `R`).
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Averages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub n_samples: usize,
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
    /// `confusion[t][p]` counts rows of true class `t` predicted as `p`,
    /// indexed over all stage ids.
    pub confusion: Vec<Vec<usize>>,
}

pub fn accuracy(truth: &[usize], pred: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(pred).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// `[n_classes, n_classes]` counts, rows are true classes.
pub fn confusion_matrix(truth: &[usize], pred: &[usize], n_classes: usize) -> Array2<usize> {
    let mut m = Array2::<usize>::zeros((n_classes, n_classes));
    for (&t, &p) in truth.iter().zip(pred) {
        if t < n_classes && p < n_classes {
            m[[t, p]] += 1;
        }
    }
    m
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-class precision / recall / F1 over the classes that occur in either
/// `truth` or `pred`. Undefined ratios (no predictions, no support) are 0.
pub fn classification_report(truth: &[usize], pred: &[usize]) -> Result<ClassificationReport> {
    if truth.len() != pred.len() {
        bail!("{} true labels but {} predictions", truth.len(), pred.len());
    }
    if truth.is_empty() {
        bail!("cannot score an empty validation set");
    }
    let n_classes = SleepStage::ALL.len();
    if let Some(&bad) = truth.iter().chain(pred).find(|&&c| c >= n_classes) {
        bail!("class id {bad} is not a sleep stage");
    }
    let cm = confusion_matrix(truth, pred, n_classes);

    let mut classes = Vec::new();
    for c in 0..n_classes {
        let support: usize = cm.row(c).sum();
        let predicted: usize = cm.column(c).sum();
        if support == 0 && predicted == 0 {
            continue;
        }
        let tp = cm[[c, c]];
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        classes.push(ClassMetrics {
            class_id: c,
            label: SleepStage::from_id(c as u8)?.display().to_string(),
            precision,
            recall,
            f1,
            support,
        });
    }

    let k = classes.len() as f64;
    let n = truth.len() as f64;
    let macro_avg = Averages {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / k,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / k,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / k,
    };
    let weighted_avg = Averages {
        precision: classes.iter().map(|c| c.precision * c.support as f64).sum::<f64>() / n,
        recall: classes.iter().map(|c| c.recall * c.support as f64).sum::<f64>() / n,
        f1: classes.iter().map(|c| c.f1 * c.support as f64).sum::<f64>() / n,
    };

    Ok(ClassificationReport {
        accuracy: accuracy(truth, pred),
        n_samples: truth.len(),
        classes,
        macro_avg,
        weighted_avg,
        confusion: cm.rows().into_iter().map(|r| r.to_vec()).collect(),
    })
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.n_samples)?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.n_samples
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_prediction() {
        let y = [0, 1, 2, 2, 4];
        let r = classification_report(&y, &y).unwrap();
        assert_abs_diff_eq!(r.accuracy, 1.0);
        assert_eq!(r.classes.len(), 4);
        assert!(r.classes.iter().all(|c| c.f1 == 1.0));
        assert_abs_diff_eq!(r.macro_avg.f1, 1.0);
    }

    #[test]
    fn hand_checked_counts() {
        // class 0: tp=2 fp=1 fn=0; class 1: tp=1 fp=0 fn=1
        let truth = [0, 0, 1, 1];
        let pred = [0, 0, 0, 1];
        let r = classification_report(&truth, &pred).unwrap();
        assert_abs_diff_eq!(r.accuracy, 0.75);
        let c0 = &r.classes[0];
        assert_abs_diff_eq!(c0.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c0.recall, 1.0);
        assert_abs_diff_eq!(c0.f1, 0.8, epsilon = 1e-12);
        let c1 = &r.classes[1];
        assert_abs_diff_eq!(c1.precision, 1.0);
        assert_abs_diff_eq!(c1.recall, 0.5);
        assert_eq!(c1.label, "1");
        assert_eq!(r.confusion[1][0], 1);
    }

    #[test]
    fn predicted_only_class_is_reported() {
        let r = classification_report(&[0, 0], &[0, 3]).unwrap();
        let c3 = r.classes.iter().find(|c| c.class_id == 3).unwrap();
        assert_eq!(c3.support, 0);
        assert_eq!(c3.label, "3/4");
        assert_abs_diff_eq!(c3.precision, 0.0);
    }

    #[test]
    fn rejects_mismatch_and_unknown() {
        assert!(classification_report(&[0], &[0, 1]).is_err());
        assert!(classification_report(&[], &[]).is_err());
        assert!(classification_report(&[7], &[0]).is_err());
    }

    #[test]
    fn renders_table() {
        let r = classification_report(&[0, 1], &[0, 1]).unwrap();
        let text = r.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
    }
}
