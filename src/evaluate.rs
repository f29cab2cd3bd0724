//! Accuracy and per-class precision/recall/F1.
//!
//! An undefined ratio (a class that is never predicted, or never present)
//! is reported as 0.0 instead of NaN.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::Serialize;
use smartcore::metrics::accuracy;

use crate::error::{PipelineError, Result};

/// Label treated as the positive (stroke) class.
pub const POSITIVE_CLASS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: i32,
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
pub struct Evaluation {
    pub accuracy: f64,
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
    pub positive_f1: f64,
    pub samples: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

pub fn class_metrics(y_true: &[i32], y_pred: &[i32], class: i32) -> ClassMetrics {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_ = 0;
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == class, p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp + fp == 0 {
        debug!("class {class} never predicted; precision set to 0");
    }
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    ClassMetrics {
        class,
        precision,
        recall,
        f1: harmonic(precision, recall),
        support: tp + fn_,
    }
}

pub fn evaluate(y_true: &[i32], y_pred: &[i32]) -> Result<Evaluation> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::LengthMismatch {
            left: y_pred.len(),
            right: y_true.len(),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::EmptyInput { what: "evaluation set" });
    }

    let truth = y_true.to_vec();
    let predicted = y_pred.to_vec();
    let acc = accuracy(&truth, &predicted);

    let labels: BTreeSet<i32> = y_true.iter().chain(y_pred).copied().collect();
    let classes: Vec<ClassMetrics> = labels
        .iter()
        .map(|&c| class_metrics(y_true, y_pred, c))
        .collect();

    let n = classes.len() as f64;
    let macro_avg = Averages {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / n,
    };
    let total = y_true.len() as f64;
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        classes
            .iter()
            .map(|c| f(c) * c.support as f64 / total)
            .sum::<f64>()
    };
    let weighted_avg = Averages {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
    };
    let positive_f1 = classes
        .iter()
        .find(|c| c.class == POSITIVE_CLASS)
        .map_or(0.0, |c| c.f1);

    Ok(Evaluation {
        accuracy: acc,
        classes,
        macro_avg,
        weighted_avg,
        positive_f1,
        samples: y_true.len(),
    })
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.class, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.samples
        )?;
        let averages = [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)];
        for (name, avg) in averages {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.samples
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn majority_only_predictions_score_zero_f1() {
        let y_true = vec![0, 0, 0, 0, 1, 1];
        let y_pred = vec![0; 6];
        let ev = evaluate(&y_true, &y_pred).unwrap();
        assert_relative_eq!(ev.accuracy, 4.0 / 6.0);
        assert_eq!(ev.positive_f1, 0.0);
        let pos = ev.classes.iter().find(|c| c.class == 1).unwrap();
        assert_eq!(pos.precision, 0.0);
        assert_eq!(pos.recall, 0.0);
        assert_eq!(pos.support, 2);
        assert!(ev.classes.iter().all(|c| c.f1.is_finite()));
    }

    #[test]
    fn per_class_numbers() {
        let y_true = vec![1, 1, 1, 0, 0, 0, 0, 0];
        let y_pred = vec![1, 1, 0, 1, 0, 0, 0, 0];
        let ev = evaluate(&y_true, &y_pred).unwrap();
        let pos = ev.classes.iter().find(|c| c.class == 1).unwrap();
        assert_relative_eq!(pos.precision, 2.0 / 3.0);
        assert_relative_eq!(pos.recall, 2.0 / 3.0);
        assert_relative_eq!(ev.positive_f1, 2.0 / 3.0);
        let neg = ev.classes.iter().find(|c| c.class == 0).unwrap();
        assert_relative_eq!(neg.precision, 0.8);
        assert_relative_eq!(neg.recall, 0.8);
        assert_relative_eq!(ev.accuracy, 0.75);
        assert_relative_eq!(ev.macro_avg.f1, (2.0 / 3.0 + 0.8) / 2.0);
    }

    #[test]
    fn positive_class_absent_everywhere() {
        let ev = evaluate(&[0, 0], &[0, 0]).unwrap();
        assert_eq!(ev.positive_f1, 0.0);
        assert_eq!(ev.accuracy, 1.0);
        // only observed labels enter the averages
        assert_eq!(ev.classes.len(), 1);
        assert_relative_eq!(ev.macro_avg.f1, 1.0);
        assert_relative_eq!(ev.weighted_avg.f1, 1.0);
    }

    #[test]
    fn rejects_mismatched_or_empty() {
        assert!(matches!(
            evaluate(&[0, 1], &[0]),
            Err(PipelineError::LengthMismatch { .. })
        ));
        assert!(matches!(
            evaluate(&[], &[]),
            Err(PipelineError::EmptyInput { .. })
        ));
    }

    #[test]
    fn report_renders_every_class() {
        let ev = evaluate(&[0, 1, 1], &[0, 1, 0]).unwrap();
        let text = ev.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        let class_rows = text
            .lines()
            .filter(|l| l.trim_start().starts_with(['0', '1']))
            .count();
        assert_eq!(class_rows, 2);
    }
}
